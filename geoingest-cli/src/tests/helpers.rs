//! Test helpers for composing blob directories, databases and event files.

use super::*;
use crate::storage::{BlobSource, StorageConfig};
use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

pub(super) const BUCKET: &str = "incoming";

pub(super) const TWO_FEATURES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "a"},
     "geometry": {"type": "Point", "coordinates": [1, 2]}},
    {"type": "Feature", "properties": {"name": "b"},
     "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
  ]
}"#;

pub(super) struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub(super) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub(super) fn path(&self, relative: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(relative)).expect("utf-8 temp path")
    }

    pub(super) fn storage(&self) -> StorageConfig {
        StorageConfig {
            database: self.path("state/features.db"),
            blobs: BlobSource::Directory(self.path("blobs")),
        }
    }

    pub(super) fn pipeline(&self) -> DynPipeline {
        self.storage().build_pipeline().expect("pipeline builds")
    }

    pub(super) fn put_blob(&self, key: &str, content: &str) {
        let path = self.path("blobs").join(BUCKET).join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create blob directory");
        }
        fs::write(path, content).expect("write blob");
    }

    pub(super) fn write_file(&self, name: &str, content: &str) -> Utf8PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("write file");
        path
    }
}

/// Arrival event JSON naming `keys` in the test bucket.
pub(super) fn arrival_event(keys: &[&str]) -> String {
    let records: Vec<_> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "s3": {"bucket": {"name": BUCKET}, "object": {"key": key}}
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}
