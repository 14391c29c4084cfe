//! Blob storage contract, key layout, and the local-filesystem
//! implementation.
//!
//! Blob storage is treated as append-only per job: every key embeds the job
//! id, and cleanup happens by deleting the whole `jobs/{id}/` prefix when a
//! job is deleted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

/// Errors surfaced by a blob storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Key of a job's uploaded artifact.
pub fn original_key(job_id: Uuid, filename: &str) -> String {
    format!("jobs/{job_id}/original/{filename}")
}

/// Key of one chunk WAV, 4-digit zero-padded.
pub fn chunk_key(job_id: Uuid, index: u32) -> String {
    format!("jobs/{job_id}/chunks/chunk-{index:04}.wav")
}

/// Key of the final transcript JSON.
pub fn result_key(job_id: Uuid) -> String {
    format!("jobs/{job_id}/result/transcript.json")
}

/// Prefix owning every blob of a job.
pub fn job_prefix(job_id: Uuid) -> String {
    format!("jobs/{job_id}/")
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove every blob under `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;
}

/// Blob store backed by a local directory; keys map to relative paths.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let path = self.path_for(prefix);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
