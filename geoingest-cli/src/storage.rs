//! Shared store and blob-source settings for commands that run the pipeline.

use camino::Utf8PathBuf;
use geoingest_core::{BlobStore, FeatureStore, Pipeline};
use geoingest_data::blob::{DEFAULT_REGION, regional_endpoint};
use geoingest_data::store::DEFAULT_DATABASE_PATH;
use geoingest_data::{
    DirectoryBlobStore, HttpBlobStore, HttpBlobStoreConfig, SqliteFeatureStore, SqliteStoreConfig,
};
use log::info;

use crate::{ARG_BLOB_ENDPOINT, ARG_BLOB_ROOT, CliError};

/// Pipeline with its adapters chosen at run time.
pub type DynPipeline = Pipeline<Box<dyn BlobStore>, Box<dyn FeatureStore>>;

/// Where blobs are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BlobSource {
    /// `<root>/<bucket>/<key>` on local disk.
    Directory(Utf8PathBuf),
    /// Path-style HTTP requests against an object store endpoint.
    Http(String),
}

/// Resolved storage settings shared by `serve` and `process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StorageConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) blobs: BlobSource,
}

impl StorageConfig {
    /// Resolve optional settings, applying defaults.
    ///
    /// A blob root wins over the HTTP endpoint; giving both is an error.
    /// Without either, blobs come from the regional S3 endpoint.
    pub(crate) fn resolve(
        database: Option<Utf8PathBuf>,
        blob_root: Option<Utf8PathBuf>,
        blob_endpoint: Option<String>,
        region: Option<String>,
    ) -> Result<Self, CliError> {
        let blobs = match (blob_root, blob_endpoint) {
            (Some(_), Some(_)) => {
                return Err(CliError::ConflictingArguments {
                    first: ARG_BLOB_ROOT,
                    second: ARG_BLOB_ENDPOINT,
                });
            }
            (Some(root), None) => BlobSource::Directory(root),
            (None, Some(endpoint)) => BlobSource::Http(endpoint),
            (None, None) => BlobSource::Http(regional_endpoint(
                region.as_deref().unwrap_or(DEFAULT_REGION),
            )),
        };
        Ok(Self {
            database: database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE_PATH)),
            blobs,
        })
    }

    /// Build the pipeline these settings describe.
    pub(crate) fn build_pipeline(&self) -> Result<DynPipeline, CliError> {
        let blobs: Box<dyn BlobStore> = match &self.blobs {
            BlobSource::Directory(root) => {
                info!("reading blobs from directory {root}");
                Box::new(DirectoryBlobStore::new(root.clone()))
            }
            BlobSource::Http(endpoint) => {
                info!("reading blobs from {endpoint}");
                let store = HttpBlobStore::with_config(HttpBlobStoreConfig::new(endpoint.clone()))
                    .map_err(|source| CliError::BuildBlobStore {
                        endpoint: endpoint.clone(),
                        source,
                    })?;
                Box::new(store)
            }
        };
        let store = SqliteFeatureStore::new(SqliteStoreConfig::new(self.database.clone()));
        Ok(Pipeline::new(blobs, Box::new(store)))
    }
}
