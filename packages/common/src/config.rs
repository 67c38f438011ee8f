use std::path::PathBuf;

use serde::Deserialize;

/// Which backing store the object gateway talks to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Filesystem,
}

/// Object store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Backend selection. Default: "filesystem".
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Bucket name (S3 backend only).
    #[serde(default)]
    pub bucket: String,
    /// Region name. Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Use path-style bucket addressing. Default: false.
    #[serde(default)]
    pub path_style: bool,
    /// Upper bound for a single backend call, in seconds. Default: 30.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Lifetime of presigned download URLs, in seconds. Default: 3600.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
    /// Root directory for the filesystem backend. Default: "./data/objects".
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Base URL the filesystem backend uses when building object URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Hard cap on a single upload in bytes. Default: 512 MiB.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Filesystem
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_presign_ttl_secs() -> u64 {
    3600
}
fn default_root() -> PathBuf {
    PathBuf::from("./data/objects")
}
fn default_public_base_url() -> String {
    "http://localhost:3000/objects".into()
}
fn default_max_upload_bytes() -> u64 {
    512 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            access_key: String::new(),
            secret_key: String::new(),
            path_style: false,
            request_timeout_secs: default_request_timeout_secs(),
            presign_ttl_secs: default_presign_ttl_secs(),
            root: default_root(),
            public_base_url: default_public_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}
