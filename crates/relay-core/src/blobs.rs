//! Content-addressed side store for file attachment bytes.
//!
//! Blobs are keyed by the SHA-256 of their contents, one file per blob.
//! History events reference blobs by id, so re-uploading a file under
//! the same name can never change what an old event replays.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::error::RelayError;

/// Lowercase hex SHA-256 of a blob's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobId(String);

impl BlobId {
    /// Compute the id for a byte slice.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Validate an id parsed from the history log.
    pub fn from_hex(s: &str) -> Option<Self> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory-backed blob store.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    /// Store bytes and return their content id. Idempotent: identical
    /// contents land on the same path.
    pub async fn store(&self, data: &[u8]) -> Result<BlobId, RelayError> {
        let id = BlobId::digest(data);
        let path = self.blob_path(&id);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            fs::write(&path, data).await?;
            debug!(blob = %id, bytes = data.len(), "stored blob");
        }

        Ok(id)
    }

    /// Load a blob's bytes; `BlobNotFound` when absent.
    pub async fn load(&self, id: &BlobId) -> Result<Vec<u8>, RelayError> {
        match fs::read(self.blob_path(id)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RelayError::BlobNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
