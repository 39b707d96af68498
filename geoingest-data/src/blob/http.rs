//! HTTP-based `BlobStore` for S3-compatible object stores.
//!
//! Objects are addressed path-style as `{endpoint}/{bucket}/{key}`, which
//! works against public or pre-authorised buckets and S3-compatible servers.
//!
//! # Architecture
//!
//! [`BlobStore`] is synchronous so the pipeline can run outside any async
//! context. This store bridges to `reqwest` by blocking on a Tokio runtime
//! it owns, or on the caller's multi-threaded runtime when there is one.
//!
//! # Example
//!
//! ```no_run
//! use geoingest_core::{BlobLocation, BlobStore};
//! use geoingest_data::blob::HttpBlobStore;
//!
//! let store = HttpBlobStore::new("http://localhost:9000")?;
//! let bytes = store.get(&BlobLocation::new("incoming", "parks.geojson"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use geoingest_core::{BlobLocation, BlobStore, FetchError};
use log::debug;
use reqwest::{Client, StatusCode};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

/// Error type for [`HttpBlobStore`] construction failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreBuildError {
    /// The endpoint is not an absolute base URL.
    #[error("invalid blob store endpoint {endpoint:?}: {message}")]
    Endpoint {
        /// Configured endpoint.
        endpoint: String,
        /// Why it was refused.
        message: String,
    },
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime")]
    Runtime(#[source] std::io::Error),
}

/// Default user agent for object requests.
pub const DEFAULT_USER_AGENT: &str = "geoingest/0.1";

/// Region used for the default endpoint.
pub const DEFAULT_REGION: &str = "eu-central-1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Regional S3 endpoint for `region`.
#[must_use]
pub fn regional_endpoint(region: &str) -> String {
    format!("https://s3.{region}.amazonaws.com")
}

/// Configuration for [`HttpBlobStore`].
#[derive(Debug, Clone)]
pub struct HttpBlobStoreConfig {
    /// Base URL of the object store.
    pub endpoint: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpBlobStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: regional_endpoint(DEFAULT_REGION),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpBlobStoreConfig {
    /// Create a new configuration with the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Object store reached over plain HTTP `GET` requests.
///
/// # Runtime behaviour
///
/// Outside any Tokio runtime, and inside a `current_thread` runtime, the
/// store blocks on its own runtime. Inside a multi-threaded runtime it uses
/// the caller's handle with [`tokio::task::block_in_place`].
pub struct HttpBlobStore {
    client: Client,
    endpoint: Url,
    config: HttpBlobStoreConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlobStore")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

impl HttpBlobStore {
    /// Create a store for `endpoint` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a base URL or if the HTTP
    /// client or Tokio runtime fails to build.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, StoreBuildError> {
        Self::with_config(HttpBlobStoreConfig::new(endpoint))
    }

    /// Create a store with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a base URL or if the HTTP
    /// client or Tokio runtime fails to build.
    pub fn with_config(config: HttpBlobStoreConfig) -> Result<Self, StoreBuildError> {
        let endpoint_error = |message: String| StoreBuildError::Endpoint {
            endpoint: config.endpoint.clone(),
            message,
        };
        let endpoint = Url::parse(&config.endpoint).map_err(|err| endpoint_error(err.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(endpoint_error("URL cannot be a base".to_owned()));
        }
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(StoreBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreBuildError::Runtime)?;
        Ok(Self {
            client,
            endpoint,
            config,
            runtime,
        })
    }

    /// Build the object URL for `location`.
    ///
    /// Bucket and key are appended as path segments, so reserved characters
    /// in the key are percent-encoded and `/` keeps its meaning.
    fn object_url(&self, location: &BlobLocation) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&location.bucket)
                .extend(location.key.split('/'));
        }
        url
    }

    async fn fetch_async(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        let url = self.object_url(location);
        debug!("fetching {location} from {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url.as_str()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                location: location.clone(),
            });
        }
        let response = response
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url.as_str()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url.as_str()))?;
        Ok(bytes.to_vec())
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return FetchError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        FetchError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

impl BlobStore for HttpBlobStore {
    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        let future = self.fetch_async(location);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}
