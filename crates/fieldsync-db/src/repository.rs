//! Repository trait abstractions
//!
//! The engine depends only on these traits so it can run against Postgres,
//! the in-memory implementations, or test doubles that inject failures.

use async_trait::async_trait;
use fieldsync_core::models::{Attachment, MediaItem, NewAttachment, SyncStatus, TicketLinkage};
use fieldsync_core::AppError;
use uuid::Uuid;

/// Sync-related columns written by the upload engine.
///
/// `None` locator/path fields leave the stored value unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStateUpdate {
    pub status: SyncStatus,
    pub remote_locator: Option<String>,
    pub storage_path: Option<String>,
}

impl SyncStateUpdate {
    pub fn status(status: SyncStatus) -> Self {
        Self {
            status,
            remote_locator: None,
            storage_path: None,
        }
    }

    pub fn synced(remote_locator: String, storage_path: String) -> Self {
        Self {
            status: SyncStatus::Synced,
            remote_locator: Some(remote_locator),
            storage_path: Some(storage_path),
        }
    }
}

/// Media item table operations
#[async_trait]
pub trait MediaItemRepository: Send + Sync {
    async fn insert(&self, item: &MediaItem) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>, AppError>;

    /// All items captured by an owner, newest first.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaItem>, AppError>;

    async fn update_sync_state(&self, id: Uuid, update: &SyncStateUpdate) -> Result<(), AppError>;

    /// Write ticket linkage in one update.
    ///
    /// Fails with `AppError::Conflict` if the item is already linked and
    /// `AppError::NotFound` if it does not exist.
    async fn set_linkage(&self, id: Uuid, linkage: &TicketLinkage) -> Result<(), AppError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Attachment table operations
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn create(&self, new: &NewAttachment) -> Result<Attachment, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Attachment>, AppError>;

    async fn list_by_ticket(&self, ticket_id: &str) -> Result<Vec<Attachment>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}
