//! Adapters connecting the ingestion pipeline to the outside world.
//!
//! Responsibilities:
//! - Persist features to SQLite behind [`geoingest_core::FeatureStore`].
//! - Fetch blobs from local directories or HTTP object stores behind
//!   [`geoingest_core::BlobStore`].
//! - Start processing tasks behind [`geoingest_core::TaskLauncher`].
//!
//! Boundaries:
//! - Do not encode pipeline rules (live in `geoingest-core`).
//! - Keep blocking I/O off async executors; HTTP fetches bridge onto a
//!   runtime explicitly.
//!
//! Invariants:
//! - Adapters are `Send + Sync` and hold no global mutable state.
//! - A feature batch is committed whole or not at all.

pub mod blob;
pub mod launch;
pub mod store;

pub use blob::{DirectoryBlobStore, HttpBlobStore, HttpBlobStoreConfig, StoreBuildError};
pub use launch::ProcessTaskLauncher;
pub use store::{SqliteFeatureStore, SqliteStoreConfig};
