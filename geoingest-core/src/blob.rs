//! Retrieval of raw blobs from an object store.
//!
//! The [`BlobStore`] trait is the only view the pipeline has of the object
//! store. Implementations live in `geoingest-data`; an in-memory double is
//! available in [`crate::test_support`].

use std::fmt;

use thiserror::Error;

/// Address of a blob inside an object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocation {
    /// Bucket (or top-level container) name.
    pub bucket: String,
    /// Object key within the bucket, already percent-decoded.
    pub key: String,
}

impl BlobLocation {
    /// Build a location from a bucket and key.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Errors from [`BlobStore::get`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No object exists at the location.
    #[error("object {location} does not exist")]
    NotFound {
        /// Requested location.
        location: BlobLocation,
    },
    /// The key cannot be mapped onto the backing store.
    #[error("object key {key:?} is not valid for this store: {message}")]
    InvalidKey {
        /// Offending key.
        key: String,
        /// Why the key was refused.
        message: String,
    },
    /// The object exists but could not be read.
    #[error("failed to read object {location}: {message}")]
    Unreadable {
        /// Requested location.
        location: BlobLocation,
        /// Underlying error message.
        message: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// URL that was requested.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The store answered with an unexpected HTTP status.
    #[error("request to {url} failed with HTTP {status}: {message}")]
    Http {
        /// URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },
    /// Transport-level failure.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// URL that was requested.
        url: String,
        /// Error message.
        message: String,
    },
}

/// Fetch the full content of a blob.
///
/// # Examples
///
/// ```
/// use geoingest_core::{BlobLocation, BlobStore, FetchError};
///
/// struct Fixed;
///
/// impl BlobStore for Fixed {
///     fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
///         if location.key.ends_with(".geojson") {
///             Ok(br#"{"type":"FeatureCollection","features":[]}"#.to_vec())
///         } else {
///             Err(FetchError::NotFound { location: location.clone() })
///         }
///     }
/// }
///
/// let bytes = Fixed.get(&BlobLocation::new("b", "f.geojson"))?;
/// assert!(!bytes.is_empty());
/// # Ok::<(), FetchError>(())
/// ```
pub trait BlobStore: Send + Sync {
    /// Return every byte stored at `location`.
    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError>;
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        (**self).get(location)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for std::sync::Arc<T> {
    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        (**self).get(location)
    }
}
