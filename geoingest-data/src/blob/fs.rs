//! Local directory standing in for an object store.

use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use geoingest_core::{BlobLocation, BlobStore, FetchError};
use log::debug;

/// `BlobStore` reading `<root>/<bucket>/<key>`.
///
/// Reads go through a capability handle on `root`, so no key can reach
/// outside it. Keys with `..`, root or prefix components are refused before
/// any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryBlobStore {
    root: Utf8PathBuf,
}

impl DirectoryBlobStore {
    /// Serve blobs below `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one subdirectory per bucket.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn relative_path(location: &BlobLocation) -> Result<Utf8PathBuf, FetchError> {
        let invalid = |message: &str| FetchError::InvalidKey {
            key: location.key.clone(),
            message: message.to_owned(),
        };
        let bucket = Utf8Path::new(&location.bucket);
        if !matches!(
            bucket.components().collect::<Vec<_>>().as_slice(),
            [Utf8Component::Normal(_)]
        ) {
            return Err(invalid("bucket must be a single path segment"));
        }
        let key = Utf8Path::new(&location.key);
        if location.key.is_empty() {
            return Err(invalid("key is empty"));
        }
        let escapes = key.components().any(|component| {
            !matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir)
        });
        if escapes {
            return Err(invalid("key must be relative and must not contain '..'"));
        }
        Ok(bucket.join(key))
    }
}

impl BlobStore for DirectoryBlobStore {
    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        let relative = Self::relative_path(location)?;
        let unreadable = |err: &io::Error| FetchError::Unreadable {
            location: location.clone(),
            message: err.to_string(),
        };
        let root = geoingest_fs::open_root_dir(&self.root).map_err(|err| unreadable(&err))?;
        let bytes = geoingest_fs::read_within(&root, &relative).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                FetchError::NotFound {
                    location: location.clone(),
                }
            } else {
                unreadable(&err)
            }
        })?;
        debug!("read {} bytes from {}/{relative}", bytes.len(), self.root);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[derive(Debug)]
    struct RootFixture {
        store: DirectoryBlobStore,
        _dir: TempDir,
    }

    #[fixture]
    fn root() -> RootFixture {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8");
        std::fs::create_dir_all(root.join("bucket/nested dir")).expect("create bucket");
        std::fs::write(root.join("bucket/nested dir/parks.geojson"), b"{\"type\":\"Feature\"}")
            .expect("write blob");
        std::fs::write(root.join("outside.geojson"), b"{}").expect("write outside blob");
        RootFixture {
            store: DirectoryBlobStore::new(root),
            _dir: dir,
        }
    }

    #[rstest]
    fn reads_existing_blob(root: RootFixture) {
        let bytes = root
            .store
            .get(&BlobLocation::new("bucket", "nested dir/parks.geojson"))
            .expect("blob exists");
        assert_eq!(bytes, b"{\"type\":\"Feature\"}");
    }

    #[rstest]
    fn missing_blob_is_not_found(root: RootFixture) {
        let location = BlobLocation::new("bucket", "absent.geojson");
        assert_eq!(
            root.store.get(&location),
            Err(FetchError::NotFound { location })
        );
    }

    #[rstest]
    #[case("bucket", "../outside.geojson")]
    #[case("bucket", "/etc/passwd")]
    #[case("bucket", "")]
    #[case("..", "outside.geojson")]
    #[case("a/b", "parks.geojson")]
    fn refuses_keys_escaping_the_root(root: RootFixture, #[case] bucket: &str, #[case] key: &str) {
        let result = root.store.get(&BlobLocation::new(bucket, key));
        assert!(
            matches!(result, Err(FetchError::InvalidKey { .. })),
            "unexpected result {result:?}"
        );
    }
}
