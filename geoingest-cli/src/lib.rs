//! Command-line interface for the GeoJSON ingestion service.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use geoingest_core::{BUCKET_ENV, KEY_ENV};
use log::info;

mod dispatch;
mod error;
pub mod logging;
mod process;
pub mod server;
mod storage;

pub use error::CliError;
pub use storage::DynPipeline;

use dispatch::DispatchArgs;
use process::{ProcessArgs, standalone_location};
use server::ServeArgs;

const ARG_BUCKET: &str = "bucket";
const ARG_KEY: &str = "key";
const ARG_DATABASE: &str = "database";
const ARG_BLOB_ROOT: &str = "blob-root";
const ARG_BLOB_ENDPOINT: &str = "blob-endpoint";
const ARG_REGION: &str = "region";
const ARG_BIND: &str = "bind";
const ARG_EVENT: &str = "event";
const ARG_CLUSTER: &str = "cluster";
const ARG_TASK_DEFINITION: &str = "task-definition";
const ARG_CONTAINER_NAME: &str = "container-name";
const ARG_SUBNETS: &str = "subnets";
const ARG_SECURITY_GROUPS: &str = "security-groups";
const ARG_ASSIGN_PUBLIC_IP: &str = "assign-public-ip";
const ARG_TASK_PROGRAM: &str = "task-program";
const ENV_PROCESS_BUCKET: &str = "GEOINGEST_CMDS_PROCESS_BUCKET";
const ENV_PROCESS_KEY: &str = "GEOINGEST_CMDS_PROCESS_KEY";
const ENV_DISPATCH_EVENT: &str = "GEOINGEST_CMDS_DISPATCH_EVENT";
const ENV_DISPATCH_CLUSTER: &str = "GEOINGEST_CMDS_DISPATCH_CLUSTER";
const ENV_DISPATCH_TASK_DEFINITION: &str = "GEOINGEST_CMDS_DISPATCH_TASK_DEFINITION";

/// Run the CLI with the current process arguments and environment.
///
/// Without a subcommand the binary behaves as a processing task when
/// `S3_BUCKET` and `S3_KEY` are set, and as the HTTP surface otherwise.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let task = Mode::from_env();
    run_command(cli.command, task)
}

/// What to do when no subcommand is given.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// Process the blob named by the task parameters, then exit.
    Task(geoingest_core::BlobLocation),
    /// Serve HTTP until interrupted.
    Serve,
}

impl Mode {
    fn from_env() -> Self {
        Self::from_parameters(std::env::var(BUCKET_ENV).ok(), std::env::var(KEY_ENV).ok())
    }

    fn from_parameters(bucket: Option<String>, key: Option<String>) -> Self {
        standalone_location(bucket, key).map_or(Self::Serve, Self::Task)
    }
}

fn run_command(command: Option<Command>, mode: Mode) -> Result<(), CliError> {
    match command {
        Some(Command::Serve(args)) => server::run_serve(args),
        Some(Command::Process(args)) => process::run_process(args),
        Some(Command::Dispatch(args)) => dispatch::run_dispatch(args),
        None => match mode {
            Mode::Task(location) => {
                info!("running as a processing task for {location}");
                process::run_process(ProcessArgs::for_location(location))
            }
            Mode::Serve => {
                info!("running as a web server");
                server::run_serve(ServeArgs::default())
            }
        },
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geoingest",
    about = "Ingest GeoJSON blobs into a spatial feature store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the health, processing and statistics endpoints.
    Serve(ServeArgs),
    /// Process one blob and print a summary.
    Process(ProcessArgs),
    /// Launch processing tasks for an arrival event file.
    Dispatch(DispatchArgs),
}

#[cfg(test)]
mod tests;
