//! Persistence of extracted features.
//!
//! The [`FeatureStore`] trait is the Persistence Gateway seen by the
//! pipeline. Implementations own connection handling, schema creation and
//! geometry parsing; the pipeline only hands them validated records.

use serde::Serialize;
use thiserror::Error;

use crate::FeatureRecord;

/// Number of files reported by the statistics endpoint.
pub const RECENT_FILES_LIMIT: usize = 10;

/// Errors raised by a [`FeatureStore`].
///
/// Every variant is fatal for the invocation that triggered it. A failed
/// insert leaves no rows from its batch behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Connecting to the store failed.
    #[error("failed to connect to feature store: {message}")]
    Connect {
        /// Underlying error message.
        message: String,
    },
    /// A schema creation step failed.
    #[error("failed to ensure schema during '{step}': {message}")]
    Schema {
        /// Name of the step that failed.
        step: &'static str,
        /// Underlying error message.
        message: String,
    },
    /// Serialising a feature's properties or geometry failed.
    #[error("failed to serialise feature {index} from {filename}: {message}")]
    Serialize {
        /// Source filename of the batch.
        filename: String,
        /// Zero-based position of the feature in its batch.
        index: usize,
        /// Underlying error message.
        message: String,
    },
    /// The store rejected a feature, for example on malformed geometry.
    #[error("failed to insert feature {index} from {filename}: {message}")]
    Insert {
        /// Source filename of the batch.
        filename: String,
        /// Zero-based position of the feature in its batch.
        index: usize,
        /// Underlying error message.
        message: String,
    },
    /// Any other store operation failed.
    #[error("failed to {operation}: {message}")]
    Store {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error message.
        message: String,
    },
}

/// Per-file aggregate reported by [`FeatureStore::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    /// Source filename (object key).
    pub filename: String,
    /// Rows persisted from the file.
    pub feature_count: u64,
    /// Timestamp of the newest row from the file.
    pub last_processed: String,
}

/// Aggregate statistics over every persisted feature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IngestStats {
    /// Total rows in the feature table.
    pub total_features: u64,
    /// Distinct source filenames.
    pub total_files: u64,
    /// Most recently processed files, newest first.
    pub recent_files: Vec<FileSummary>,
}

/// Persistence Gateway for extracted features.
///
/// Implementations must be safe to share across threads; each call is
/// expected to use its own connection.
pub trait FeatureStore: Send + Sync {
    /// Create the spatial catalogue and feature table if absent.
    ///
    /// Must be idempotent and safe to run concurrently from several
    /// processes.
    fn ensure_schema(&self) -> Result<(), PersistenceError>;

    /// Persist `features` from `filename` as a single all-or-nothing batch.
    ///
    /// Returns the number of rows attempted. On error no row from the batch
    /// is visible to other readers.
    fn insert_features(
        &self,
        filename: &str,
        features: &[FeatureRecord],
    ) -> Result<usize, PersistenceError>;

    /// Report totals and up to `recent_limit` most recently processed files.
    fn stats(&self, recent_limit: usize) -> Result<IngestStats, PersistenceError>;
}

impl<T: FeatureStore + ?Sized> FeatureStore for Box<T> {
    fn ensure_schema(&self) -> Result<(), PersistenceError> {
        (**self).ensure_schema()
    }

    fn insert_features(
        &self,
        filename: &str,
        features: &[FeatureRecord],
    ) -> Result<usize, PersistenceError> {
        (**self).insert_features(filename, features)
    }

    fn stats(&self, recent_limit: usize) -> Result<IngestStats, PersistenceError> {
        (**self).stats(recent_limit)
    }
}

impl<T: FeatureStore + ?Sized> FeatureStore for std::sync::Arc<T> {
    fn ensure_schema(&self) -> Result<(), PersistenceError> {
        (**self).ensure_schema()
    }

    fn insert_features(
        &self,
        filename: &str,
        features: &[FeatureRecord],
    ) -> Result<usize, PersistenceError> {
        (**self).insert_features(filename, features)
    }

    fn stats(&self, recent_limit: usize) -> Result<IngestStats, PersistenceError> {
        (**self).stats(recent_limit)
    }
}
