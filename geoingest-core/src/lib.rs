//! Core domain of the GeoJSON ingestion pipeline.
//!
//! This crate holds the document model, the feature extractor, the
//! processing orchestrator and the event dispatcher. Storage, blob
//! retrieval and task launching are reached only through the
//! [`FeatureStore`], [`BlobStore`] and [`TaskLauncher`] traits, whose
//! production implementations live in `geoingest-data`.

mod blob;
mod dispatch;
mod document;
mod extract;
mod launch;
mod pipeline;
mod store;
pub mod test_support;

pub use blob::{BlobLocation, BlobStore, FetchError};
pub use dispatch::{
    ArrivalEvent, ArrivalRecord, BucketRef, DispatchError, DispatchReport, DispatchResponse,
    Dispatcher, GEOJSON_SUFFIX, ObjectNotification, ObjectRef, SUCCESS_BODY, decode_key,
    is_geojson_key,
};
pub use document::{GeometryDocument, GeometryKind, UnknownGeometryKind, ValidationError, validate};
pub use extract::{DEFAULT_FEATURE_TYPE, FeatureRecord, extract};
pub use launch::{
    BUCKET_ENV, DEFAULT_CONTAINER_NAME, KEY_ENV, LaunchError, LaunchReceipt, LaunchRequest,
    NetworkConfig, TaskLauncher, TaskTemplate,
};
pub use pipeline::{
    ErrorKind, ParseError, Pipeline, ProcessError, ProcessingOutcome, Stage, parse_json,
};
pub use store::{FeatureStore, FileSummary, IngestStats, PersistenceError, RECENT_FILES_LIMIT};
