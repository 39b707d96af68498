//! SQLite-backed Persistence Gateway.
//!
//! [`SqliteFeatureStore`] implements [`FeatureStore`] with one connection per
//! call. Geometry text is handed to the store-side `ST_GeomFromGeoJSON`
//! function at insert time, so the store stays authoritative for geometry
//! validity. Each batch is one transaction committed after the last feature;
//! a failure anywhere drops the transaction and leaves no rows behind.

mod geometry;
mod schema;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use geoingest_core::{FeatureRecord, FeatureStore, FileSummary, IngestStats, PersistenceError};
use log::{debug, info};
use rusqlite::{Connection, Error as SqliteError};

pub use geometry::{
    EncodeGeometryError, GEOMETRY_ENCODING, GEOMETRY_FUNCTION, GEOMETRY_SRID, GeometryParseError,
    decode_geometry, encode_geometry_text, parse_geometry,
};
pub use schema::{FEATURE_TABLE, SchemaError, initialise_schema};

/// Database file used when none is configured.
pub const DEFAULT_DATABASE_PATH: &str = "geoingest.db";
/// How long a connection waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const INSERT_FEATURE: &str = "INSERT INTO geojson_data (filename, feature_type, properties, geometry)
     VALUES (?1, ?2, ?3, ST_GeomFromGeoJSON(?4))";

const RECENT_FILES: &str = "SELECT filename, COUNT(*) AS feature_count, MAX(processed_at) AS last_processed
     FROM geojson_data
     GROUP BY filename
     ORDER BY last_processed DESC, MAX(id) DESC
     LIMIT ?1";

/// Connection settings for [`SqliteFeatureStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreConfig {
    /// Database file; parent directories are created on first use.
    pub path: Utf8PathBuf,
    /// Time to wait for a competing writer before failing.
    pub busy_timeout: Duration,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl SqliteStoreConfig {
    /// Configuration for the database at `path` with the default timeout.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

/// Feature store persisting rows to a SQLite database file.
///
/// # Examples
/// ```
/// use geoingest_core::{FeatureRecord, FeatureStore};
/// use geoingest_data::store::SqliteFeatureStore;
/// use serde_json::json;
///
/// let dir = tempfile::tempdir()?;
/// let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("features.db"))
///     .expect("utf-8 path");
/// let store = SqliteFeatureStore::open(path);
/// store.ensure_schema()?;
///
/// let record = FeatureRecord::from_value(&json!({
///     "type": "Feature",
///     "geometry": {"type": "Point", "coordinates": [1, 2]}
/// }));
/// assert_eq!(store.insert_features("f.geojson", &[record])?, 1);
/// assert_eq!(store.stats(10)?.total_features, 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SqliteFeatureStore {
    config: SqliteStoreConfig,
}

impl SqliteFeatureStore {
    /// Build a store from explicit configuration.
    #[must_use]
    pub const fn new(config: SqliteStoreConfig) -> Self {
        Self { config }
    }

    /// Build a store for the database at `path`.
    #[must_use]
    pub fn open(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(SqliteStoreConfig::new(path))
    }

    /// Database file backing this store.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.config.path
    }

    fn connect(&self) -> Result<Connection, PersistenceError> {
        let path = &self.config.path;
        geoingest_fs::ensure_parent_dir(path).map_err(|err| PersistenceError::Connect {
            message: format!("failed to create parent directory for {path}: {err}"),
        })?;
        let connect_error = |err: SqliteError| PersistenceError::Connect {
            message: format!("{path}: {err}"),
        };
        let connection = Connection::open(path.as_std_path()).map_err(connect_error)?;
        connection
            .busy_timeout(self.config.busy_timeout)
            .map_err(connect_error)?;
        geometry::register_functions(&connection).map_err(connect_error)?;
        debug!("opened feature store at {path}");
        Ok(connection)
    }
}

fn store_error(operation: &'static str) -> impl Fn(SqliteError) -> PersistenceError {
    move |err| PersistenceError::Store {
        operation,
        message: err.to_string(),
    }
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

impl FeatureStore for SqliteFeatureStore {
    fn ensure_schema(&self) -> Result<(), PersistenceError> {
        let mut connection = self.connect()?;
        initialise_schema(&mut connection).map_err(|err| PersistenceError::Schema {
            step: err.step,
            message: err.source.to_string(),
        })?;
        info!("feature table verified in {}", self.config.path);
        Ok(())
    }

    fn insert_features(
        &self,
        filename: &str,
        features: &[FeatureRecord],
    ) -> Result<usize, PersistenceError> {
        let mut connection = self.connect()?;
        let transaction = connection
            .transaction()
            .map_err(store_error("begin feature transaction"))?;
        {
            let mut statement = transaction
                .prepare(INSERT_FEATURE)
                .map_err(store_error("prepare feature insert"))?;
            for (index, feature) in features.iter().enumerate() {
                let serialise_error = |err: serde_json::Error| PersistenceError::Serialize {
                    filename: filename.to_owned(),
                    index,
                    message: err.to_string(),
                };
                let properties =
                    serde_json::to_string(&feature.properties).map_err(serialise_error)?;
                let geometry = serde_json::to_string(&feature.geometry).map_err(serialise_error)?;
                statement
                    .execute((filename, &feature.feature_type, properties, geometry))
                    .map_err(|err| PersistenceError::Insert {
                        filename: filename.to_owned(),
                        index,
                        message: err.to_string(),
                    })?;
            }
        }
        transaction
            .commit()
            .map_err(store_error("commit feature transaction"))?;
        Ok(features.len())
    }

    fn stats(&self, recent_limit: usize) -> Result<IngestStats, PersistenceError> {
        let connection = self.connect()?;
        if !schema::feature_table_exists(&connection).map_err(store_error("inspect schema"))? {
            return Ok(IngestStats::default());
        }
        let (total_features, total_files): (i64, i64) = connection
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT filename) FROM geojson_data",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(store_error("count features"))?;
        let limit = i64::try_from(recent_limit).unwrap_or(i64::MAX);
        let mut statement = connection
            .prepare(RECENT_FILES)
            .map_err(store_error("prepare recent files query"))?;
        let recent_files = statement
            .query_map([limit], |row| {
                Ok(FileSummary {
                    filename: row.get(0)?,
                    feature_count: to_u64(row.get(1)?),
                    last_processed: row.get(2)?,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(store_error("query recent files"))?;
        Ok(IngestStats {
            total_features: to_u64(total_features),
            total_files: to_u64(total_files),
            recent_files,
        })
    }
}
