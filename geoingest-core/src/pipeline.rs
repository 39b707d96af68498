//! Processing Orchestrator.
//!
//! [`Pipeline::process`] drives one blob through a linear state machine:
//!
//! ```text
//! Idle -> Downloading -> Validating -> Extracting -> Persisting -> Done
//! ```
//!
//! Any stage may move to `Failed`. There are no retries; the invoking layer
//! owns retry policy. A document that is valid JSON but not GeoJSON is a
//! soft stop: it is reported in the [`ProcessingOutcome`] rather than raised,
//! so callers can tell "not geospatial content" apart from infrastructure
//! faults.

use std::fmt;

use log::{debug, error, info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::{
    BlobLocation, BlobStore, FeatureStore, FetchError, GeometryDocument, PersistenceError,
    ValidationError,
};

/// Position of one invocation in the processing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Not started.
    Idle,
    /// Fetching the blob.
    Downloading,
    /// Parsing and validating the document.
    Validating,
    /// Normalising the document into feature records.
    Extracting,
    /// Ensuring the schema and inserting features.
    Persisting,
    /// Finished successfully, or stopped on an invalid document.
    Done,
    /// Finished with a hard failure.
    Failed,
}

impl Stage {
    /// Lower-case stage name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Validating => "validating",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed taxonomy of processing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The blob could not be retrieved. Fatal.
    Fetch,
    /// The blob is not UTF-8 JSON. Fatal.
    Parse,
    /// The JSON is not a recognised GeoJSON document. Soft stop.
    Validation,
    /// The store failed to connect, migrate or insert. Fatal.
    Persistence,
}

impl ErrorKind {
    /// Whether this kind aborts the invocation with an error.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Validation)
    }
}

/// Errors raised while decoding blob content.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The blob is not valid UTF-8 text.
    #[error("content is not valid UTF-8")]
    Utf8 {
        /// Decoder error.
        #[source]
        source: std::str::Utf8Error,
    },
    /// The text is not well-formed JSON.
    #[error("content is not valid JSON")]
    Json {
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
}

/// Decode blob bytes into a JSON value.
pub fn parse_json(bytes: &[u8]) -> Result<Value, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|source| ParseError::Utf8 { source })?;
    serde_json::from_str(text).map_err(|source| ParseError::Json { source })
}

/// Hard failure of one [`Pipeline::process`] invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Downloading the blob failed.
    #[error("failed to download {location}")]
    Fetch {
        /// Blob being processed.
        location: BlobLocation,
        /// Store error.
        #[source]
        source: FetchError,
    },
    /// The blob content could not be decoded.
    #[error("failed to parse {location}")]
    Parse {
        /// Blob being processed.
        location: BlobLocation,
        /// Decoder error.
        #[source]
        source: ParseError,
    },
    /// Persisting the features failed; nothing from the blob was stored.
    #[error("failed to persist features from {location}")]
    Persistence {
        /// Blob being processed.
        location: BlobLocation,
        /// Store error.
        #[source]
        source: PersistenceError,
    },
}

impl ProcessError {
    /// The taxonomy entry for this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// The stage that was running when the failure occurred.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Fetch { .. } => Stage::Downloading,
            Self::Parse { .. } => Stage::Validating,
            Self::Persistence { .. } => Stage::Persisting,
        }
    }

    /// The blob being processed.
    #[must_use]
    pub const fn location(&self) -> &BlobLocation {
        match self {
            Self::Fetch { location, .. }
            | Self::Parse { location, .. }
            | Self::Persistence { location, .. } => location,
        }
    }

    /// Render the error and its source chain on one line.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Result of processing one blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOutcome {
    /// Blob that was processed.
    pub location: BlobLocation,
    /// Features handed to the store.
    pub attempted: usize,
    /// Features the store reported as inserted.
    pub inserted: usize,
    /// Why the document was rejected, when it was not GeoJSON.
    pub rejection: Option<ValidationError>,
}

impl ProcessingOutcome {
    /// Whether processing stopped early on an invalid document.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }
}

/// Coordinates download, validation, extraction and persistence of blobs.
///
/// # Examples
///
/// ```
/// use geoingest_core::{BlobLocation, Pipeline};
/// use geoingest_core::test_support::{MemoryBlobStore, MemoryFeatureStore};
///
/// let location = BlobLocation::new("b", "f.geojson");
/// let blobs = MemoryBlobStore::default().with_blob(
///     location.clone(),
///     r#"{"type":"Feature","properties":{"name":"x"}}"#,
/// );
/// let pipeline = Pipeline::new(blobs, MemoryFeatureStore::default());
///
/// let outcome = pipeline.process(&location)?;
/// assert_eq!(outcome.inserted, 1);
/// # Ok::<(), geoingest_core::ProcessError>(())
/// ```
#[derive(Debug)]
pub struct Pipeline<B, S> {
    blobs: B,
    store: S,
}

impl<B, S> Pipeline<B, S>
where
    B: BlobStore,
    S: FeatureStore,
{
    /// Build a pipeline reading from `blobs` and writing to `store`.
    pub const fn new(blobs: B, store: S) -> Self {
        Self { blobs, store }
    }

    /// The blob store this pipeline reads from.
    pub const fn blobs(&self) -> &B {
        &self.blobs
    }

    /// The feature store this pipeline writes to.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Process the blob at `location` to completion.
    ///
    /// Returns an outcome with `rejection` set when the content is JSON but
    /// not a GeoJSON document; nothing is persisted in that case.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when the blob cannot be fetched or decoded,
    /// or when the store fails. A persistence failure leaves no features from
    /// this blob in the store.
    pub fn process(&self, location: &BlobLocation) -> Result<ProcessingOutcome, ProcessError> {
        let result = self.run(location);
        if let Err(err) = &result {
            error!(
                "processing {location} failed while {}: {}",
                err.stage(),
                err.detailed_message()
            );
        }
        result
    }

    fn run(&self, location: &BlobLocation) -> Result<ProcessingOutcome, ProcessError> {
        enter(location, Stage::Downloading);
        let bytes = self
            .blobs
            .get(location)
            .map_err(|source| ProcessError::Fetch {
                location: location.clone(),
                source,
            })?;
        info!("downloaded {location} ({} bytes)", bytes.len());

        enter(location, Stage::Validating);
        let value = parse_json(&bytes).map_err(|source| ProcessError::Parse {
            location: location.clone(),
            source,
        })?;
        let document = match GeometryDocument::parse(value) {
            Ok(document) => document,
            Err(reason) => {
                warn!("rejected {}: {reason}", location.key);
                enter(location, Stage::Done);
                return Ok(ProcessingOutcome {
                    location: location.clone(),
                    attempted: 0,
                    inserted: 0,
                    rejection: Some(reason),
                });
            }
        };

        enter(location, Stage::Extracting);
        let features = document.features();

        enter(location, Stage::Persisting);
        let persistence = |source| ProcessError::Persistence {
            location: location.clone(),
            source,
        };
        self.store.ensure_schema().map_err(persistence)?;
        debug!("schema verified for {location}");
        let inserted = self
            .store
            .insert_features(&location.key, &features)
            .map_err(persistence)?;
        info!("inserted {inserted} features from {}", location.key);

        enter(location, Stage::Done);
        Ok(ProcessingOutcome {
            location: location.clone(),
            attempted: features.len(),
            inserted,
            rejection: None,
        })
    }
}

fn enter(location: &BlobLocation, stage: Stage) {
    debug!("{location}: {stage}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryBlobStore, MemoryFeatureStore};
    use rstest::{fixture, rstest};

    const SINGLE_POINT: &str = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"x"},"geometry":{"type":"Point","coordinates":[1,2]}}]}"#;

    #[fixture]
    fn location() -> BlobLocation {
        BlobLocation::new("b", "f.geojson")
    }

    fn pipeline_with(
        location: &BlobLocation,
        content: impl Into<Vec<u8>>,
    ) -> Pipeline<MemoryBlobStore, MemoryFeatureStore> {
        Pipeline::new(
            MemoryBlobStore::default().with_blob(location.clone(), content),
            MemoryFeatureStore::default(),
        )
    }

    #[rstest]
    fn persists_collection_features(location: BlobLocation) {
        let pipeline = pipeline_with(&location, SINGLE_POINT);

        let outcome = pipeline.process(&location).expect("processing succeeds");

        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.inserted, 1);
        assert!(!outcome.is_rejected());
        let rows = pipeline.store().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].filename, "f.geojson");
        assert_eq!(rows[0].record.feature_type, "Feature");
    }

    #[rstest]
    fn empty_collection_still_ensures_schema(location: BlobLocation) {
        let pipeline = pipeline_with(&location, r#"{"type":"FeatureCollection","features":[]}"#);

        let outcome = pipeline.process(&location).expect("processing succeeds");

        assert_eq!(outcome.inserted, 0);
        assert!(pipeline.store().schema_ensured());
        assert_eq!(pipeline.store().batches(), vec![0]);
    }

    #[rstest]
    #[case(r#"{"features": []}"#, ValidationError::MissingType)]
    #[case(r#"[1, 2, 3]"#, ValidationError::NotAnObject)]
    #[case(r#"{"type": "Topology"}"#, ValidationError::UnknownType("\"Topology\"".into()))]
    fn invalid_document_is_a_soft_stop(
        location: BlobLocation,
        #[case] content: &str,
        #[case] expected: ValidationError,
    ) {
        let pipeline = pipeline_with(&location, content);

        let outcome = pipeline.process(&location).expect("rejection is not an error");

        assert_eq!(outcome.rejection, Some(expected));
        assert!(!pipeline.store().schema_ensured());
        assert!(pipeline.store().rows().is_empty());
    }

    #[rstest]
    fn bare_geometry_persists_nothing(location: BlobLocation) {
        let pipeline = pipeline_with(&location, r#"{"type":"Point","coordinates":[0,0]}"#);

        let outcome = pipeline.process(&location).expect("processing succeeds");

        assert_eq!(outcome.attempted, 0);
        assert!(!outcome.is_rejected());
        assert!(pipeline.store().rows().is_empty());
    }

    #[rstest]
    fn missing_blob_is_a_fetch_error(location: BlobLocation) {
        let pipeline = Pipeline::new(MemoryBlobStore::default(), MemoryFeatureStore::default());

        let err = pipeline.process(&location).expect_err("blob is missing");

        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(err.stage(), Stage::Downloading);
        assert!(matches!(
            err,
            ProcessError::Fetch {
                source: FetchError::NotFound { .. },
                ..
            }
        ));
    }

    #[rstest]
    #[case(b"{not json".to_vec())]
    #[case(vec![0xff, 0xfe, 0x7b])]
    fn undecodable_content_is_a_parse_error(location: BlobLocation, #[case] content: Vec<u8>) {
        let pipeline = pipeline_with(&location, content);

        let err = pipeline.process(&location).expect_err("content is invalid");

        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.kind().is_fatal());
    }

    #[rstest]
    fn store_failure_is_fatal_and_leaves_no_rows(location: BlobLocation) {
        let content = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature"},{"type":"Feature"},{"type":"Feature"},{"type":"Feature"},{"type":"Feature"}
        ]}"#;
        let pipeline = Pipeline::new(
            MemoryBlobStore::default().with_blob(location.clone(), content),
            MemoryFeatureStore::default().failing_at(2),
        );

        let err = pipeline.process(&location).expect_err("insert fails");

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.location(), &location);
        assert!(err.detailed_message().contains("feature 2"));
        assert!(pipeline.store().rows().is_empty());
    }

    #[rstest]
    fn validation_is_the_only_soft_kind() {
        assert!(!ErrorKind::Validation.is_fatal());
        assert!(ErrorKind::Fetch.is_fatal());
        assert!(ErrorKind::Persistence.is_fatal());
    }
}
