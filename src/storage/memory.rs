//! In-memory object store for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_key, ObjectStore, StorageError, StoredObject};
use crate::models::ComponentHealth;

#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    container: String,
    objects: RwLock<BTreeMap<String, MemoryObject>>,
    puts: AtomicU32,
}

impl MemoryStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Default::default()
        }
    }

    /// Number of `put` calls served, including overwrites.
    pub fn put_count(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn object(&self, key: &str) -> Option<MemoryObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.write().await.insert(
            key.to_string(),
            MemoryObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{}/{}", self.container, key),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::healthy().with_detail("in-memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overwrite_keeps_single_object() {
        let store = MemoryStore::new("c");
        let meta = HashMap::new();
        store.put("k/document.pdf", b"1", "application/pdf", &meta).await.unwrap();
        store.put("k/document.pdf", b"2", "application/pdf", &meta).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.get("k/document.pdf").await.unwrap(), b"2");
    }
}
