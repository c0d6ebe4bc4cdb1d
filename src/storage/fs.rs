//! Filesystem-backed object store.
//!
//! Objects live at `{root}/{container}/{key}`. Object metadata is written to a
//! `{key}.meta.json` sidecar, which is hidden from listings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{validate_key, ObjectStore, StorageError, StoredObject};
use crate::models::ComponentHealth;

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    size_bytes: u64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

pub struct FsStore {
    root: PathBuf,
    container: String,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
        }
    }

    pub fn container_dir(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.container_dir().join(key))
    }

    fn url_for(path: &Path) -> String {
        url::Url::from_file_path(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FsStore {
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
        let path = self.object_path(key)?;
        write_atomic(&path, data).await?;

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            size_bytes: data.len() as u64,
            metadata: metadata.clone(),
        };
        let sidecar_json = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let sidecar_path = PathBuf::from(format!("{}{}", path.display(), SIDECAR_SUFFIX));
        write_atomic(&sidecar_path, &sidecar_json).await?;

        debug!(key, bytes = data.len(), "Stored object");
        Ok(StoredObject {
            key: key.to_string(),
            url: Self::url_for(&path),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let sidecar_path = PathBuf::from(format!("{}{}", path.display(), SIDECAR_SUFFIX));
        for target in [&path, &sidecar_path] {
            match tokio::fs::remove_file(target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(key, "Deleted object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let base = self.container_dir();
        let mut keys = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&base) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.ends_with(SIDECAR_SUFFIX) || key.contains(".tmp-") {
                    continue;
                }
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    async fn health(&self) -> ComponentHealth {
        let dir = self.container_dir();
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => ComponentHealth::healthy().with_detail(dir.display().to_string()),
            Err(e) => ComponentHealth::unhealthy(format!("{}: {}", dir.display(), e)),
        }
    }
}
