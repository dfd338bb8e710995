//! Blob storage backends for paper attachments
//!
//! Blobs are addressed by relative keys such as `papers/<uuid>-exam.pdf`.
//! A key never carries the host's directory layout, so the same key
//! resolves on every machine that mounts the store under a different root.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Durably write data to the key. Returns only after the data is stored.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read data stored under the key.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete data under the key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if data exists under the key.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Reject keys that could escape the store root or leak host paths
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains(':')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(AppError::storage(format!("Invalid blob key '{}'", key)));
    }
    Ok(())
}

/// Filesystem storage backend rooted at a directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Round-trip a probe file to catch permission problems at startup
    pub async fn validate(&self) -> Result<()> {
        let probe = ".health-check/probe.bin";
        self.write(probe, b"storage-health-check").await?;
        let data = self.read(probe).await?;
        if data != b"storage-health-check" {
            return Err(AppError::storage("read-back mismatch"));
        }
        self.delete(probe).await?;
        let _ = fs::remove_dir(self.root.join(".health-check")).await;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(key)?;
        debug!(key = %key, size = data.len(), "blob_store: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "blob_store: create_dir_all failed");
                AppError::storage(format!("Failed to create directory: {}", e))
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create blob: {}", e)))?;
        file.write_all(data)
            .await
            .map_err(|e| AppError::storage(format!("Failed to write blob: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| AppError::storage(format!("Failed to sync blob: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(key = %key, error = %e, "blob_store: rename failed");
            AppError::storage(format!("Failed to commit blob: {}", e))
        })?;

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(key)?;
        fs::read(&full_path)
            .await
            .map_err(|e| AppError::storage(format!("Failed to read blob '{}': {}", key, e)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.full_path(key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(format!(
                "Failed to delete blob '{}': {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_path = self.full_path(key)?;
        Ok(fs::try_exists(&full_path).await.unwrap_or(false))
    }
}

/// In-process backend for tests and `memory://` development runs
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().await.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::storage(format!("Blob '{}' not found", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.blobs.read().await.contains_key(key))
    }
}
