//! In-memory repositories.
//!
//! Same contracts as the Postgres repositories, including the
//! at-most-once linkage rule, without a database.

use async_trait::async_trait;
use chrono::Utc;
use fieldsync_core::models::{Attachment, MediaItem, NewAttachment, TicketLinkage};
use fieldsync_core::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::repository::{AttachmentRepository, MediaItemRepository, SyncStateUpdate};

#[derive(Clone, Default)]
pub struct InMemoryMediaItemRepository {
    items: Arc<Mutex<HashMap<Uuid, MediaItem>>>,
}

impl InMemoryMediaItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaItemRepository for InMemoryMediaItemRepository {
    async fn insert(&self, item: &MediaItem) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if items.contains_key(&item.id) {
            return Err(AppError::Conflict(format!(
                "Media item {} already exists",
                item.id
            )));
        }
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>, AppError> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaItem>, AppError> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let mut owned: Vec<MediaItem> = items
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update_sync_state(&self, id: Uuid, update: &SyncStateUpdate) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let item = items
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Media item {} not found", id)))?;
        item.sync_status = update.status;
        if let Some(locator) = &update.remote_locator {
            item.remote_locator = Some(locator.clone());
        }
        if let Some(path) = &update.storage_path {
            item.storage_path = Some(path.clone());
        }
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn set_linkage(&self, id: Uuid, linkage: &TicketLinkage) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let item = items
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Media item {} not found", id)))?;
        if item.linkage.is_some() {
            return Err(AppError::Conflict(format!(
                "Media item {} is already assigned",
                id
            )));
        }
        item.linkage = Some(linkage.clone());
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items.remove(&id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAttachmentRepository {
    attachments: Arc<Mutex<HashMap<Uuid, Attachment>>>,
}

impl InMemoryAttachmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Attachment> {
        let attachments = self.attachments.lock().unwrap_or_else(|e| e.into_inner());
        attachments.values().cloned().collect()
    }
}

#[async_trait]
impl AttachmentRepository for InMemoryAttachmentRepository {
    async fn create(&self, new: &NewAttachment) -> Result<Attachment, AppError> {
        let attachment = new.clone().into_attachment(Uuid::new_v4());
        let mut attachments = self.attachments.lock().unwrap_or_else(|e| e.into_inner());
        attachments.insert(attachment.id, attachment.clone());
        Ok(attachment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Attachment>, AppError> {
        let attachments = self.attachments.lock().unwrap_or_else(|e| e.into_inner());
        Ok(attachments.get(&id).cloned())
    }

    async fn list_by_ticket(&self, ticket_id: &str) -> Result<Vec<Attachment>, AppError> {
        let attachments = self.attachments.lock().unwrap_or_else(|e| e.into_inner());
        let mut found: Vec<Attachment> = attachments
            .values()
            .filter(|a| a.ticket_id == ticket_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(found)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut attachments = self.attachments.lock().unwrap_or_else(|e| e.into_inner());
        Ok(attachments.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::models::{MediaType, NewMediaItem, SyncStatus};
    use std::collections::BTreeMap;

    fn item() -> MediaItem {
        MediaItem::from_capture(NewMediaItem {
            owner_id: Uuid::new_v4(),
            media_type: MediaType::Audio,
            file_name: "memo.m4a".to_string(),
            local_path: "/tmp/memo.m4a".to_string(),
            file_size_bytes: 10,
            duration_seconds: Some(1.0),
            width: None,
            height: None,
            metadata: BTreeMap::new(),
        })
    }

    #[tokio::test]
    async fn linkage_is_written_once() {
        let repo = InMemoryMediaItemRepository::new();
        let item = item();
        repo.insert(&item).await.unwrap();

        let linkage = TicketLinkage {
            ticket_id: "ticket-1".to_string(),
            attachment_id: Uuid::new_v4(),
            assigned_at: Utc::now(),
        };
        repo.set_linkage(item.id, &linkage).await.unwrap();

        let second = TicketLinkage {
            ticket_id: "ticket-2".to_string(),
            ..linkage.clone()
        };
        let err = repo.set_linkage(item.id, &second).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.ticket_id(), Some("ticket-1"));
    }

    #[tokio::test]
    async fn sync_update_keeps_unset_fields() {
        let repo = InMemoryMediaItemRepository::new();
        let item = item();
        repo.insert(&item).await.unwrap();

        repo.update_sync_state(
            item.id,
            &SyncStateUpdate::synced("http://x/o/i".to_string(), "o/i".to_string()),
        )
        .await
        .unwrap();
        repo.update_sync_state(item.id, &SyncStateUpdate::status(SyncStatus::Synced))
            .await
            .unwrap();

        let stored = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.storage_path.as_deref(), Some("o/i"));
        assert_eq!(stored.remote_locator.as_deref(), Some("http://x/o/i"));

        assert!(matches!(
            repo.update_sync_state(Uuid::new_v4(), &SyncStateUpdate::status(SyncStatus::Failed))
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let repo = InMemoryMediaItemRepository::new();
        let item = item();
        repo.insert(&item).await.unwrap();
        assert!(repo.delete(item.id).await.unwrap());
        assert!(!repo.delete(item.id).await.unwrap());
        assert!(repo.is_empty());
    }
}
