//! Object storage abstraction for uploads and build artifacts.
//! Uses Apache Arrow's `object_store` crate.

use std::path::Path;
use std::sync::Arc;

use object_store::{local::LocalFileSystem, path::Path as StoragePath, ObjectStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Storage client wrapping any `object_store` backend. The builds/uploads
/// roots are local filesystem directories in normal operation; in-memory
/// storage backs `StorageProvider::Memory` for tests.
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub root_label: String,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, root_label: String) -> Self {
        Self { store, root_label }
    }

    /// Backs a root directory (builds or uploads) with the local filesystem.
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
            root_label: root.display().to_string(),
        })
    }

    /// In-memory storage for testing/development.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            root_label: "memory".to_string(),
        }
    }

    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(key, size, "uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag.clone(),
            size,
        })
    }

    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::ObjectStoreError(other),
        })?;

        let bytes = result.bytes().await?;

        tracing::info!(key, size = bytes.len(), "downloaded from storage");

        Ok(bytes.to_vec())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Size of a stored object, used to populate the status surface's
    /// `apkSize`.
    pub async fn size(&self, key: &str) -> Result<u64> {
        let path = StoragePath::from(key);
        let meta = self.store.head(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::ObjectStoreError(other),
        })?;
        Ok(meta.size as u64)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
