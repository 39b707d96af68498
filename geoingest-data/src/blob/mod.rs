//! Blob store adapters.
//!
//! - [`DirectoryBlobStore`] serves `<root>/<bucket>/<key>` from local disk.
//! - [`HttpBlobStore`] fetches path-style `{endpoint}/{bucket}/{key}` URLs.

mod fs;
mod http;

pub use fs::DirectoryBlobStore;
pub use http::{
    DEFAULT_REGION, DEFAULT_USER_AGENT, HttpBlobStore, HttpBlobStoreConfig, StoreBuildError,
    regional_endpoint,
};
