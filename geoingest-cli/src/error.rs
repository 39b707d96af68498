//! Error types emitted by the geoingest CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geoingest_core::ProcessError;
use geoingest_data::StoreBuildError;
use thiserror::Error;

/// Errors emitted by the geoingest CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Two options that select the same resource were both given.
    #[error("--{first} and --{second} cannot be combined")]
    ConflictingArguments {
        first: &'static str,
        second: &'static str,
    },
    /// The HTTP blob store could not be built.
    #[error("failed to build blob store for {endpoint}")]
    BuildBlobStore {
        endpoint: String,
        #[source]
        source: StoreBuildError,
    },
    /// Processing a blob failed.
    #[error(transparent)]
    Process(#[from] Box<ProcessError>),
    /// The arrival event file could not be read.
    #[error("failed to read event file {path}")]
    ReadEvent {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The arrival event file is not JSON.
    #[error("event file {path} is not valid JSON")]
    ParseEvent {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The dispatcher answered with a failure status.
    #[error("dispatch failed with status {status}: {body}")]
    DispatchFailed { status: u16, body: String },
    /// Command output could not be serialised.
    #[error("failed to serialise command output")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Command output could not be written.
    #[error("failed to write command output")]
    WriteOutput(#[source] std::io::Error),
    /// The async runtime for the HTTP surface failed to start.
    #[error("failed to start the Tokio runtime")]
    Runtime(#[source] std::io::Error),
    /// The HTTP surface could not bind its listening address.
    #[error("failed to bind {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// The HTTP surface stopped with an I/O error.
    #[error("HTTP server failed")]
    Serve(#[source] std::io::Error),
}

impl From<ProcessError> for CliError {
    fn from(source: ProcessError) -> Self {
        Self::Process(Box::new(source))
    }
}
