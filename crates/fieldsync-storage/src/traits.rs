//! Storage abstraction trait
//!
//! One `Storage` value addresses exactly one bucket. The engine holds one per
//! logical bucket (see [`crate::Buckets`]).

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte source handed to [`Storage::upload_stream`].
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Chunked byte stream returned by [`Storage::download_stream`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// All backends (S3, local filesystem) implement this so the engine never
/// couples to a specific provider.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Name of the bucket this handle writes to.
    fn bucket(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Upload bytes from a reader to `storage_key`, in parts for large bodies.
    ///
    /// Returns the number of bytes written. Writing to an existing key replaces it.
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ByteReader,
    ) -> StorageResult<u64>;

    /// Download a whole object into memory.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download an object as a stream of chunks.
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Publicly resolvable URL for an object.
    async fn public_url(&self, storage_key: &str) -> StorageResult<String>;

    /// Upload the file at `path` to `storage_key`.
    async fn upload_file(
        &self,
        storage_key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<u64> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let length = file.metadata().await.ok().map(|m| m.len());
        self.upload_stream(storage_key, content_type, length, Box::pin(file))
            .await
    }

    /// Stream an object into a local file, creating parent directories.
    async fn download_to_file(&self, storage_key: &str, dest: &Path) -> StorageResult<u64> {
        let mut stream = self.download_stream(storage_key).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }
}
