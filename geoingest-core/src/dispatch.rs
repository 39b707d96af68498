//! Event Dispatcher.
//!
//! Reacts to object-store arrival notifications by launching one isolated
//! processing task per GeoJSON blob. Records are handled sequentially; a
//! launch failure stops the batch, leaving earlier tasks running.

use log::{error, info};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{BlobLocation, LaunchError, LaunchReceipt, TaskLauncher, TaskTemplate};

/// Suffix, compared case-insensitively, of keys that are dispatched.
pub const GEOJSON_SUFFIX: &str = ".geojson";
/// Response body returned when every accepted record was launched.
pub const SUCCESS_BODY: &str = "Successfully triggered processing tasks";

/// A batch of arrival notifications.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArrivalEvent {
    /// Notification records, in delivery order.
    #[serde(rename = "Records")]
    pub records: Vec<ArrivalRecord>,
}

/// One arrival notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArrivalRecord {
    /// Object-store section of the notification.
    pub s3: ObjectNotification,
}

/// Bucket and object named by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectNotification {
    /// Bucket holding the new object.
    pub bucket: BucketRef,
    /// The new object.
    pub object: ObjectRef,
}

/// Bucket reference inside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketRef {
    /// Bucket name.
    pub name: String,
}

/// Object reference inside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectRef {
    /// Form-encoded object key.
    pub key: String,
}

impl ArrivalRecord {
    /// Location of the new object with its key decoded.
    #[must_use]
    pub fn location(&self) -> BlobLocation {
        BlobLocation::new(self.s3.bucket.name.clone(), decode_key(&self.s3.object.key))
    }
}

/// Decode a form-encoded object key: `+` becomes a space, then `%XX`
/// escapes are resolved. Invalid UTF-8 is replaced rather than rejected.
///
/// # Examples
///
/// ```
/// use geoingest_core::decode_key;
///
/// assert_eq!(decode_key("my+dir/caf%C3%A9.geojson"), "my dir/café.geojson");
/// ```
#[must_use]
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Whether `key` names a GeoJSON blob.
#[must_use]
pub fn is_geojson_key(key: &str) -> bool {
    key.to_lowercase().ends_with(GEOJSON_SUFFIX)
}

/// Errors that abort a dispatch batch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event does not have the expected shape.
    #[error("malformed arrival event: {source}")]
    Event {
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// Launching the task for one record failed.
    #[error("failed to launch processing task for {location}: {source}")]
    Launch {
        /// Blob whose task failed to start.
        location: BlobLocation,
        /// Launcher error.
        #[source]
        source: LaunchError,
    },
}

/// Summary of a successfully dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Tasks started, in record order.
    pub launched: Vec<(BlobLocation, LaunchReceipt)>,
    /// Records skipped because their key is not GeoJSON.
    pub skipped: Vec<BlobLocation>,
}

impl DispatchReport {
    /// Number of tasks started.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.launched.len()
    }
}

/// Invocation result in the shape expected by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    /// HTTP-style status: 200 or 500.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded message string.
    pub body: String,
}

impl DispatchResponse {
    fn new(status_code: u16, message: &str) -> Self {
        // Encoding a plain string cannot fail; fall back to the raw text.
        let body = serde_json::to_string(message).unwrap_or_else(|_| message.to_owned());
        Self { status_code, body }
    }

    /// Whether the batch was handled without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Launches a processing task for each GeoJSON arrival.
#[derive(Debug)]
pub struct Dispatcher<L> {
    template: TaskTemplate,
    launcher: L,
}

impl<L: TaskLauncher> Dispatcher<L> {
    /// Build a dispatcher using a fixed task `template`.
    pub const fn new(template: TaskTemplate, launcher: L) -> Self {
        Self { template, launcher }
    }

    /// The launcher used by this dispatcher.
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Launch a task for every GeoJSON record in `event`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Event`] when `event` is not an arrival batch
    /// and [`DispatchError::Launch`] on the first launcher failure.
    pub fn dispatch(&self, event: &Value) -> Result<DispatchReport, DispatchError> {
        let batch =
            ArrivalEvent::deserialize(event).map_err(|source| DispatchError::Event { source })?;
        let mut report = DispatchReport::default();
        for record in &batch.records {
            let location = record.location();
            info!(
                "arrival event: bucket={}, key={}",
                location.bucket, location.key
            );
            if !is_geojson_key(&location.key) {
                info!("skipping non-GeoJSON object {}", location.key);
                report.skipped.push(location);
                continue;
            }
            let request = self.template.request_for(&location);
            let receipt = self
                .launcher
                .launch(&request)
                .map_err(|source| DispatchError::Launch {
                    location: location.clone(),
                    source,
                })?;
            info!("launched task {receipt} for {location}");
            report.launched.push((location, receipt));
        }
        Ok(report)
    }

    /// Handle an arrival event and answer in the event source's format.
    #[must_use]
    pub fn on_arrival(&self, event: &Value) -> DispatchResponse {
        match self.dispatch(event) {
            Ok(_) => DispatchResponse::new(200, SUCCESS_BODY),
            Err(err) => {
                error!("error processing arrival event: {err}");
                DispatchResponse::new(500, &format!("Error: {err}"))
            }
        }
    }
}
