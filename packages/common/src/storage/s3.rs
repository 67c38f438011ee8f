use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ::s3::creds::Credentials;
use ::s3::error::S3Error;
use ::s3::{Bucket, Region};
use tracing::{debug, warn};

use super::error::StorageError;
use super::key::ObjectKey;
use super::traits::{ObjectStore, StoredObject};
use crate::config::StorageConfig;

/// S3-compatible object store.
///
/// Constructed once at startup and shared behind an `Arc<dyn ObjectStore>`.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    timeout: Duration,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.bucket.is_empty() {
            return Err(StorageError::Backend("storage.bucket is not configured".into()));
        }

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(backend)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn object_url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.bucket.url(), key)
    }

    /// Run a backend call under the configured timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, S3Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(backend),
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        }
    }
}

fn backend(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        key: &ObjectKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let response = self
            .bounded(
                self.bucket
                    .put_object_with_content_type(key.as_str(), data, content_type),
            )
            .await?;

        let status = response.status_code();
        if !is_success(status) {
            warn!(key = %key, status, "S3 PUT rejected");
            return Err(StorageError::Backend(format!("PUT returned status {status}")));
        }

        debug!(key = %key, size = data.len(), "S3 PUT complete");
        Ok(StoredObject::new(key, self.object_url(key), data))
    }

    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError> {
        let response = self.bounded(self.bucket.get_object(key.as_str())).await?;
        match response.status_code() {
            status if is_success(status) => Ok(response.bytes().to_vec()),
            404 => Err(StorageError::NotFound(key.to_string())),
            status => Err(StorageError::Backend(format!("GET returned status {status}"))),
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let response = self.bounded(self.bucket.delete_object(key.as_str())).await?;
        match response.status_code() {
            status if is_success(status) => Ok(true),
            404 => Ok(false),
            status => Err(StorageError::Backend(format!(
                "DELETE returned status {status}"
            ))),
        }
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let result = tokio::time::timeout(self.timeout, self.bucket.head_object(key.as_str()))
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))?;

        match result {
            Ok((_, status)) if is_success(status) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => Err(StorageError::Backend(format!(
                "HEAD returned status {status}"
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn presigned_url(&self, key: &ObjectKey, ttl: Duration) -> Result<String, StorageError> {
        // S3 caps presigned URLs at seven days.
        let expiry_secs = ttl.as_secs().clamp(1, 604_800) as u32;
        self.bounded(self.bucket.presign_get(key.as_str(), expiry_secs, None))
            .await
    }
}
