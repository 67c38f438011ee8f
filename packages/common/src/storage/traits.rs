use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::key::ObjectKey;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Result of a confirmed write to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub key: String,
    /// Direct (unsigned) URL of the object.
    pub url: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub checksum: String,
}

impl StoredObject {
    pub fn new(key: &ObjectKey, url: String, data: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            url,
            size: data.len() as u64,
            checksum: hex::encode(Sha256::digest(data)),
        }
    }
}

/// Key-addressed object storage used for user files.
///
/// Writes to the same key are idempotent overwrites. Implementations must
/// bound every network call so a stuck backend fails the request instead of
/// hanging it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` with the given content type.
    async fn upload(
        &self,
        key: &ObjectKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError>;

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        let data = self.get(key).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError>;

    /// Produce a time-limited GET URL for an object.
    async fn presigned_url(&self, key: &ObjectKey, ttl: Duration) -> Result<String, StorageError>;
}
