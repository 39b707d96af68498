#![forbid(unsafe_code)]

use rusqlite::{Connection, Error as SqliteError, Transaction, TransactionBehavior};

use super::geometry::{GEOMETRY_ENCODING, GEOMETRY_SRID};

/// Table receiving one row per persisted feature.
pub const FEATURE_TABLE: &str = "geojson_data";

/// Errors raised while creating the feature schema.
#[derive(Debug, thiserror::Error)]
#[error("schema step '{step}' failed")]
pub struct SchemaError {
    /// Name of the failing step.
    pub step: &'static str,
    /// Source error returned by `rusqlite`.
    #[source]
    pub source: SqliteError,
}

/// Create the spatial catalogue and the feature table if they are absent.
///
/// Every statement is idempotent and the whole sequence runs in one
/// immediate transaction, so concurrent callers serialise on the write lock
/// instead of racing on DDL.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use geoingest_data::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create schema");
/// initialise_schema(&mut conn).expect("second run is a no-op");
///
/// let registered: i64 = conn
///     .query_row("SELECT COUNT(*) FROM geometry_columns", [], |row| row.get(0))
///     .expect("read catalogue");
/// assert_eq!(registered, 1);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| SchemaError {
            step: "begin schema transaction",
            source,
        })?;

    create_spatial_catalogue(&transaction)?;
    create_feature_table(&transaction)?;

    transaction.commit().map_err(|source| SchemaError {
        step: "commit schema transaction",
        source,
    })
}

fn create_spatial_catalogue(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create geometry_columns",
        "CREATE TABLE IF NOT EXISTS geometry_columns (
            f_table_name TEXT NOT NULL,
            f_geometry_column TEXT NOT NULL,
            geometry_type TEXT NOT NULL,
            srid INTEGER NOT NULL,
            encoding TEXT NOT NULL,
            PRIMARY KEY (f_table_name, f_geometry_column)
        ) WITHOUT ROWID",
    )?;
    transaction
        .execute(
            "INSERT OR IGNORE INTO geometry_columns
                (f_table_name, f_geometry_column, geometry_type, srid, encoding)
             VALUES (?1, 'geometry', 'GEOMETRY', ?2, ?3)",
            (FEATURE_TABLE, GEOMETRY_SRID, GEOMETRY_ENCODING),
        )
        .map(|_| ())
        .map_err(|source| SchemaError {
            step: "register geometry column",
            source,
        })
}

fn create_feature_table(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create geojson_data",
        "CREATE TABLE IF NOT EXISTS geojson_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            feature_type TEXT,
            properties TEXT CHECK (properties IS NULL OR json_valid(properties)),
            geometry BLOB,
            processed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )?;
    run_migration_step(
        transaction,
        "index geojson_data",
        "CREATE INDEX IF NOT EXISTS idx_geojson_data_filename
            ON geojson_data(filename, processed_at)",
    )
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError { step, source })
}

/// Whether the feature table exists on `connection`.
pub(crate) fn feature_table_exists(connection: &Connection) -> Result<bool, SqliteError> {
    connection.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [FEATURE_TABLE],
        |row| row.get(0),
    )
}
