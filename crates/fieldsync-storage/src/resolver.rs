//! Platform URI resolution.
//!
//! A captured item's `local_path` is either a filesystem path (optionally as a
//! `file://` URI) or an opaque media-library handle such as `ph://…` or
//! `content://…`. Handles must be resolved to a concrete path before any bytes
//! can be read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unknown media handle: {0}")]
    UnknownHandle(String),

    #[error("Resolved path does not exist: {0}")]
    Missing(String),

    #[error("Platform resolver error: {0}")]
    Platform(String),
}

/// Resolves opaque platform media-library handles to filesystem paths.
#[async_trait]
pub trait UriResolver: Send + Sync {
    async fn resolve(&self, handle: &str) -> Result<PathBuf, ResolveError>;
}

/// Whether `source` is an opaque platform handle rather than a path.
pub fn is_platform_handle(source: &str) -> bool {
    match source.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && !scheme.eq_ignore_ascii_case("file")
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+' || c == '.')
        }
        None => false,
    }
}

/// Filesystem path of a non-handle source (strips a `file://` prefix).
pub fn local_file_path(source: &str) -> PathBuf {
    match source.strip_prefix("file://") {
        Some(rest) => PathBuf::from(rest),
        None => PathBuf::from(source),
    }
}

/// Resolver backed by an explicit handle table.
///
/// Suitable where the host platform hands over its handle mapping up front,
/// and for tests.
#[derive(Default)]
pub struct StaticUriResolver {
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl StaticUriResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: impl Into<String>, path: impl Into<PathBuf>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(handle.into(), path.into());
    }
}

#[async_trait]
impl UriResolver for StaticUriResolver {
    async fn resolve(&self, handle: &str) -> Result<PathBuf, ResolveError> {
        let path = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .get(handle)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownHandle(handle.to_string()))?
        };

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ResolveError::Missing(path.display().to_string()));
        }

        Ok(path)
    }
}
