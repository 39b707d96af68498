//! In-memory collaborators used by unit and behaviour tests.
//!
//! [`MemoryFeatureStore`] honours the same all-or-nothing batch contract as
//! the SQLite store so pipeline tests exercise real rollback behaviour.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    BlobLocation, BlobStore, FeatureRecord, FeatureStore, FetchError, FileSummary, IngestStats,
    LaunchError, LaunchReceipt, LaunchRequest, PersistenceError, TaskLauncher,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `BlobStore` serving blobs from a map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<BlobLocation, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Add a blob, replacing any existing content at `location`.
    #[must_use]
    pub fn with_blob(mut self, location: BlobLocation, content: impl Into<Vec<u8>>) -> Self {
        self.insert(location, content);
        self
    }

    /// Add a blob in place.
    pub fn insert(&mut self, location: BlobLocation, content: impl Into<Vec<u8>>) {
        self.blobs.insert(location, content.into());
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        self.blobs
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                location: location.clone(),
            })
    }
}

/// A row committed to a [`MemoryFeatureStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    /// Sequential identifier starting at 1.
    pub id: u64,
    /// Source filename.
    pub filename: String,
    /// The persisted record.
    pub record: FeatureRecord,
}

#[derive(Debug, Default)]
struct MemoryState {
    schema_ensured: bool,
    rows: Vec<StoredFeature>,
    batches: Vec<usize>,
}

/// `FeatureStore` keeping committed rows in memory.
///
/// Batches are staged and only appended once every record succeeded. A store
/// built with [`MemoryFeatureStore::failing_at`] fails on the record at that
/// index of every batch, discarding the staged rows.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    state: Mutex<MemoryState>,
    fail_at: Option<usize>,
}

impl MemoryFeatureStore {
    /// Fail every batch on the record at zero-based `index`.
    #[must_use]
    pub const fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Committed rows in insertion order.
    pub fn rows(&self) -> Vec<StoredFeature> {
        lock(&self.state).rows.clone()
    }

    /// Sizes of committed batches in order.
    pub fn batches(&self) -> Vec<usize> {
        lock(&self.state).batches.clone()
    }

    /// Whether `ensure_schema` has run.
    pub fn schema_ensured(&self) -> bool {
        lock(&self.state).schema_ensured
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn ensure_schema(&self) -> Result<(), PersistenceError> {
        lock(&self.state).schema_ensured = true;
        Ok(())
    }

    fn insert_features(
        &self,
        filename: &str,
        features: &[FeatureRecord],
    ) -> Result<usize, PersistenceError> {
        let mut state = lock(&self.state);
        if !state.schema_ensured {
            return Err(PersistenceError::Store {
                operation: "insert features",
                message: "no such table: geojson_data".to_owned(),
            });
        }
        let next_id = state.rows.last().map_or(1, |row| row.id + 1);
        let mut staged = Vec::with_capacity(features.len());
        for (index, record) in features.iter().enumerate() {
            if self.fail_at == Some(index) {
                return Err(PersistenceError::Insert {
                    filename: filename.to_owned(),
                    index,
                    message: "injected failure".to_owned(),
                });
            }
            staged.push(StoredFeature {
                id: next_id + staged.len() as u64,
                filename: filename.to_owned(),
                record: record.clone(),
            });
        }
        state.rows.extend(staged);
        state.batches.push(features.len());
        Ok(features.len())
    }

    fn stats(&self, recent_limit: usize) -> Result<IngestStats, PersistenceError> {
        let state = lock(&self.state);
        let mut files: Vec<FileSummary> = Vec::new();
        // Walk newest first so the first sighting of a file is its latest row.
        for row in state.rows.iter().rev() {
            match files.iter_mut().find(|file| file.filename == row.filename) {
                Some(file) => file.feature_count += 1,
                None => files.push(FileSummary {
                    filename: row.filename.clone(),
                    feature_count: 1,
                    last_processed: format!("{:020}", row.id),
                }),
            }
        }
        let total_files = files.len() as u64;
        files.truncate(recent_limit);
        Ok(IngestStats {
            total_features: state.rows.len() as u64,
            total_files,
            recent_files: files,
        })
    }
}

#[derive(Debug, Default)]
struct LauncherState {
    requests: Vec<LaunchRequest>,
}

/// `TaskLauncher` recording every request it receives.
///
/// By default every launch succeeds with receipt `task-<n>`.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    state: Mutex<LauncherState>,
    fail_after: Option<usize>,
}

impl RecordingLauncher {
    /// Succeed for the first `launches` requests and fail afterwards.
    #[must_use]
    pub const fn failing_after(mut self, launches: usize) -> Self {
        self.fail_after = Some(launches);
        self
    }

    /// Requests received so far, including failed ones.
    pub fn requests(&self) -> Vec<LaunchRequest> {
        lock(&self.state).requests.clone()
    }
}

impl TaskLauncher for RecordingLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchReceipt, LaunchError> {
        let mut state = lock(&self.state);
        let seen = state.requests.len();
        state.requests.push(request.clone());
        if self.fail_after.is_some_and(|limit| seen >= limit) {
            return Err(LaunchError::Failed {
                cluster: request.cluster.clone(),
                task_definition: request.task_definition.clone(),
                message: "capacity unavailable".to_owned(),
            });
        }
        Ok(LaunchReceipt(format!("task-{}", seen + 1)))
    }
}
