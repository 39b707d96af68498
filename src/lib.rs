//! Facade crate for the GeoJSON ingestion pipeline.
//!
//! This crate re-exports the core domain types together with the SQLite,
//! blob-store and task-launcher adapters.

#![forbid(unsafe_code)]

pub use geoingest_core::{
    BlobLocation, BlobStore, DispatchError, DispatchReport, DispatchResponse, Dispatcher,
    ErrorKind, FeatureRecord, FeatureStore, FetchError, FileSummary, GeometryDocument,
    GeometryKind, IngestStats, LaunchError, LaunchReceipt, LaunchRequest, NetworkConfig,
    ParseError, PersistenceError, Pipeline, ProcessError, ProcessingOutcome, Stage, TaskLauncher,
    TaskTemplate, ValidationError, extract, validate,
};

pub use geoingest_data::{
    DirectoryBlobStore, HttpBlobStore, HttpBlobStoreConfig, ProcessTaskLauncher,
    SqliteFeatureStore, SqliteStoreConfig, StoreBuildError,
};
