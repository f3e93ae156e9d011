//! Object storage for uploaded originals
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage root unavailable: {0}")]
    Root(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub location: String,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, location: String) -> Self {
        Self { store, location }
    }

    /// Filesystem-backed storage rooted at `root` (created if missing)
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self {
            store: Arc::new(store),
            location: root.display().to_string(),
        })
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            location: "memory".to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Local => Self::local(&config.root),
            StorageProvider::Memory => Ok(Self::in_memory()),
        }
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: Bytes) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::debug!(key, size, "Stored object");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Bytes> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(result.bytes().await?)
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let storage = StorageClient::in_memory();
        let meta = storage
            .upload("a.jpg", Bytes::from_static(b"jpeg-bytes"))
            .await
            .unwrap();
        assert_eq!(meta.size, 10);

        assert!(storage.exists("a.jpg").await.unwrap());
        assert_eq!(storage.download("a.jpg").await.unwrap(), &b"jpeg-bytes"[..]);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let storage = StorageClient::in_memory();
        assert!(!storage.exists("missing.jpg").await.unwrap());
        assert!(matches!(
            storage.download("missing.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_storage_writes_under_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads");
        let storage = StorageClient::local(&root).unwrap();

        storage
            .upload("leaf.jpg", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert!(root.join("leaf.jpg").exists());

        storage.delete("leaf.jpg").await.unwrap();
        assert!(!root.join("leaf.jpg").exists());
    }
}
