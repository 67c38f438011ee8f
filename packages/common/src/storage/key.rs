use std::fmt;

use uuid::Uuid;

use super::error::StorageError;

/// Maximum length of a full object key, matching the S3 limit.
const MAX_KEY_LEN: usize = 1024;

/// A validated object key inside the backing store.
///
/// Keys produced by [`ObjectKey::for_file`] are namespaced by owner and
/// container so two tenants can never address the same object:
/// `users/{owner}/containers/{container}/{file}/{filename}`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build the namespaced key for a stored file.
    ///
    /// The file id makes the key unique per upload, so re-using a filename
    /// after a soft delete never overwrites the old object.
    pub fn for_file(owner_id: i32, container_id: Uuid, file_id: Uuid, filename: &str) -> Self {
        Self(format!(
            "users/{owner_id}/containers/{container_id}/{file_id}/{}",
            sanitize_segment(filename)
        ))
    }

    /// Parse a key previously produced by this module (e.g. read back from the database).
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        if raw.is_empty() {
            return Err(StorageError::InvalidKey("key is empty".into()));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key exceeds {MAX_KEY_LEN} bytes"
            )));
        }
        if raw.starts_with('/') || raw.contains('\\') || raw.contains('\0') {
            return Err(StorageError::InvalidKey(raw.to_string()));
        }
        if raw.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(StorageError::InvalidKey(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

/// Replace anything outside a conservative character set with `_`.
fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(255).collect()
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
