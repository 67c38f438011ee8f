mod error;
mod key;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use key::ObjectKey;
pub use traits::{BoxReader, ObjectStore, StoredObject};

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

/// Build the configured object store. Called once at process start; the
/// returned handle is cloned into every component that needs it.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Filesystem => {
            let store = filesystem::FilesystemObjectStore::new(
                config.root.clone(),
                config.public_base_url.clone(),
                config.max_upload_bytes,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "object-storage")]
        StorageBackend::S3 => Ok(Arc::new(s3::S3ObjectStore::new(config)?)),
        #[cfg(not(feature = "object-storage"))]
        StorageBackend::S3 => Err(StorageError::Backend(
            "S3 backend requires the `object-storage` feature".into(),
        )),
    }
}
