use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the backing object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The object key is malformed or escapes its namespace.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The object exceeds the configured size limit.
    #[error("object exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// The backing store did not answer within the request timeout.
    #[error("object store request timed out after {0:?}")]
    Timeout(Duration),

    /// The backing store rejected or failed the request.
    #[error("object store backend error: {0}")]
    Backend(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the error means the object is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
