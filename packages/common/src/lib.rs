//! Shared building blocks for the portfolio platform: the object store
//! gateway and its configuration.

pub mod config;
pub mod storage;

pub use config::{StorageBackend, StorageConfig};
