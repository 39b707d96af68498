//! `process` command and standalone-task mode.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geoingest_core::{BlobLocation, ProcessingOutcome};
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::storage::{DynPipeline, StorageConfig};
use crate::{
    ARG_BLOB_ENDPOINT, ARG_BLOB_ROOT, ARG_BUCKET, ARG_DATABASE, ARG_KEY, ARG_REGION, CliError,
    ENV_PROCESS_BUCKET, ENV_PROCESS_KEY,
};

/// CLI arguments for the `process` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "process",
    long_about = "Download one GeoJSON blob, validate it, and persist its \
                 features as a single batch. Settings can come from CLI \
                 flags, configuration files, or environment variables.",
    about = "Process one GeoJSON blob"
)]
#[ortho_config(prefix = "GEOINGEST")]
pub(crate) struct ProcessArgs {
    /// Bucket holding the blob.
    #[arg(long = ARG_BUCKET, value_name = "name")]
    #[serde(default)]
    pub(crate) bucket: Option<String>,
    /// Key of the blob within the bucket.
    #[arg(long = ARG_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) key: Option<String>,
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

impl ProcessArgs {
    /// Arguments for the blob named by the standalone-task parameters.
    pub(crate) fn for_location(location: BlobLocation) -> Self {
        Self {
            bucket: Some(location.bucket),
            key: Some(location.key),
            ..Self::default()
        }
    }

    pub(crate) fn into_config(self) -> Result<ProcessConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ProcessConfig::try_from(merged)
    }
}

/// Resolved `process` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessConfig {
    pub(crate) location: BlobLocation,
    pub(crate) storage: StorageConfig,
}

impl TryFrom<ProcessArgs> for ProcessConfig {
    type Error = CliError;

    fn try_from(args: ProcessArgs) -> Result<Self, Self::Error> {
        let bucket = non_empty(args.bucket).ok_or(CliError::MissingArgument {
            field: ARG_BUCKET,
            env: ENV_PROCESS_BUCKET,
        })?;
        let key = non_empty(args.key).ok_or(CliError::MissingArgument {
            field: ARG_KEY,
            env: ENV_PROCESS_KEY,
        })?;
        let storage =
            StorageConfig::resolve(args.database, args.blob_root, args.blob_endpoint, args.region)?;
        Ok(Self {
            location: BlobLocation::new(bucket, key),
            storage,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Location named by the standalone-task parameters, if both are set.
pub(crate) fn standalone_location(
    bucket: Option<String>,
    key: Option<String>,
) -> Option<BlobLocation> {
    Some(BlobLocation::new(non_empty(bucket)?, non_empty(key)?))
}

/// Summary printed after a `process` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ProcessReport {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) features_inserted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rejected: Option<String>,
}

impl From<ProcessingOutcome> for ProcessReport {
    fn from(outcome: ProcessingOutcome) -> Self {
        Self {
            bucket: outcome.location.bucket,
            key: outcome.location.key,
            features_inserted: outcome.inserted,
            rejected: outcome.rejection.map(|reason| reason.to_string()),
        }
    }
}

pub(crate) fn run_process(args: ProcessArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let pipeline = config.storage.build_pipeline()?;
    let mut stdout = std::io::stdout().lock();
    run_process_with(&pipeline, &config.location, &mut stdout)
}

pub(crate) fn run_process_with(
    pipeline: &DynPipeline,
    location: &BlobLocation,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let outcome = pipeline.process(location)?;
    match &outcome.rejection {
        Some(reason) => warn!("{location} was not processed: {reason}"),
        None => info!("processing of {location} completed"),
    }
    write_report(writer, &ProcessReport::from(outcome))
}

fn write_report(writer: &mut dyn Write, report: &ProcessReport) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(report).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
