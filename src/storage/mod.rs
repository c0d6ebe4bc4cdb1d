//! Object storage for review copies of documents.
//!
//! Stores are addressed by `/`-separated keys inside a named container.
//! Writes to an existing key overwrite it.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ComponentHealth;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn container(&self) -> &str;

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys under `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn health(&self) -> ComponentHealth;
}

/// Reject keys that are empty, absolute, or try to escape the container.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
