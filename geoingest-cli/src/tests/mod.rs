//! Shared test harness modules for the geoingest CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod dispatch_steps;
mod helpers;
mod server;
