//! HTTP surface: health check, manual processing and ingestion statistics.
//!
//! Handlers are thin. Pipeline and store calls are blocking, so each one runs
//! on Tokio's blocking pool.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use camino::Utf8PathBuf;
use clap::Parser;
use geoingest_core::{BlobLocation, FeatureStore, IngestStats, RECENT_FILES_LIMIT};
use log::{error, info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::storage::{DynPipeline, StorageConfig};
use crate::{ARG_BIND, ARG_BLOB_ENDPOINT, ARG_BLOB_ROOT, ARG_DATABASE, ARG_REGION, CliError};

/// Address the HTTP surface listens on by default.
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "geojson-processor";

const MISSING_LOCATION: &str = "bucket and key are required";

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "serve",
    long_about = "Serve the health, manual processing and statistics \
                 endpoints over HTTP until interrupted.",
    about = "Run the HTTP surface"
)]
#[ortho_config(prefix = "GEOINGEST")]
pub(crate) struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long = ARG_BIND, value_name = "addr")]
    #[serde(default)]
    pub(crate) bind: Option<String>,
    /// SQLite database receiving the features.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Read blobs from `<dir>/<bucket>/<key>` instead of an object store.
    #[arg(long = ARG_BLOB_ROOT, value_name = "dir")]
    #[serde(default)]
    pub(crate) blob_root: Option<Utf8PathBuf>,
    /// Base URL of an S3-compatible object store.
    #[arg(long = ARG_BLOB_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) blob_endpoint: Option<String>,
    /// Region of the default S3 endpoint.
    #[arg(long = ARG_REGION, value_name = "region")]
    #[serde(default)]
    pub(crate) region: Option<String>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    pub(crate) bind: String,
    pub(crate) storage: StorageConfig,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            bind: args.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned()),
            storage: StorageConfig::resolve(
                args.database,
                args.blob_root,
                args.blob_endpoint,
                args.region,
            )?,
        })
    }
}

/// Failures answered by the HTTP surface as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request is missing required input.
    #[error("{message}")]
    BadRequest {
        /// Human readable message.
        message: String,
    },
    /// Processing or the store failed.
    #[error("{message}")]
    Internal {
        /// Human readable message.
        message: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            Self::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Body of `POST /process`.
#[derive(Debug, Default, Deserialize)]
struct ProcessRequest {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

impl ProcessRequest {
    fn location(self) -> Option<BlobLocation> {
        let bucket = self.bucket.filter(|bucket| !bucket.is_empty())?;
        let key = self.key.filter(|key| !key.is_empty())?;
        Some(BlobLocation::new(bucket, key))
    }
}

/// Body answered by a successful `POST /process`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// Human readable summary.
    pub message: String,
    /// Rows written for the blob.
    pub features_inserted: usize,
    /// Why the document was not processed, when it was not GeoJSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

/// Build the router serving `pipeline`.
pub fn router(pipeline: Arc<DynPipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn process(
    State(pipeline): State<Arc<DynPipeline>>,
    body: Bytes,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request: ProcessRequest = serde_json::from_slice(&body).unwrap_or_default();
    let location = request.location().ok_or_else(|| ApiError::BadRequest {
        message: MISSING_LOCATION.to_owned(),
    })?;
    let outcome = tokio::task::spawn_blocking(move || pipeline.process(&location))
        .await
        .map_err(|err| internal(&err))?
        .map_err(|err| {
            let message = err.detailed_message();
            error!("manual processing failed: {message}");
            ApiError::Internal { message }
        })?;
    if let Some(reason) = &outcome.rejection {
        warn!("manual processing rejected {}: {reason}", outcome.location);
    }
    Ok(Json(ProcessResponse {
        message: format!(
            "Successfully processed {} from {}",
            outcome.location.key, outcome.location.bucket
        ),
        features_inserted: outcome.inserted,
        rejected: outcome.rejection.map(|reason| reason.to_string()),
    }))
}

async fn stats(State(pipeline): State<Arc<DynPipeline>>) -> Result<Json<IngestStats>, ApiError> {
    let stats = tokio::task::spawn_blocking(move || pipeline.store().stats(RECENT_FILES_LIMIT))
        .await
        .map_err(|err| internal(&err))?
        .map_err(|err| {
            error!("failed to get stats: {err}");
            internal(&err)
        })?;
    Ok(Json(stats))
}

fn internal(err: &dyn std::error::Error) -> ApiError {
    ApiError::Internal {
        message: err.to_string(),
    }
}

pub(crate) fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let pipeline = Arc::new(config.storage.build_pipeline()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    // The last reference is dropped outside the runtime: the HTTP blob store
    // owns a runtime of its own, which must not be dropped in async context.
    runtime.block_on(serve(config.bind, Arc::clone(&pipeline)))
}

async fn serve(bind: String, pipeline: Arc<DynPipeline>) -> Result<(), CliError> {
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|source| CliError::Bind {
            address: bind.clone(),
            source,
        })?;
    info!("listening on {bind}");
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(err) => {
            warn!("cannot listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
    }
}
