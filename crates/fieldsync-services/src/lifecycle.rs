//! Media lifecycle operations: deletion of an item and its bytes.
//!
//! The record, the local file and the intake object are removed by three
//! independent best-effort steps. A failing step is logged and does not stop
//! the others.

use fieldsync_core::models::MediaItem;
use fieldsync_storage::{is_platform_handle, local_file_path};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::EngineContext;
use crate::events::SyncEvent;

#[derive(Clone)]
pub struct MediaLifecycleService {
    ctx: Arc<EngineContext>,
}

impl MediaLifecycleService {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Delete an item. Unknown ids are a no-op.
    ///
    /// Ticket-bucket objects and attachment records belong to the ticket and
    /// are left in place. Platform media-library assets are not removed.
    /// An upload still running for the item discards its own intake object
    /// once it finds the item gone.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, item_id: Uuid) {
        let Some(item) = self.lookup(item_id).await else {
            tracing::debug!(item_id = %item_id, "Delete of unknown item ignored");
            return;
        };

        tokio::join!(
            self.delete_record(item_id),
            self.delete_local_file(&item),
            self.delete_intake_object(&item),
        );

        if let Some(latest) = self.ctx.store.remove(item_id) {
            // A sync that finished while the steps ran left an intake copy
            if latest.storage_path.is_some() && latest.storage_path != item.storage_path {
                self.delete_intake_object(&latest).await;
            }
            self.ctx.events.publish(SyncEvent::Deleted { item_id });
        }
        tracing::info!(item_id = %item_id, "Media item deleted");
    }

    /// Store snapshot first, then the relational record.
    async fn lookup(&self, item_id: Uuid) -> Option<MediaItem> {
        if let Some(item) = self.ctx.store.get(item_id) {
            return Some(item);
        }
        match self.ctx.items.get(item_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    item_id = %item_id,
                    error = %e,
                    "Failed to look up item for deletion"
                );
                None
            }
        }
    }

    async fn delete_record(&self, item_id: Uuid) {
        match self.ctx.items.delete(item_id).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(item_id = %item_id, "No record to delete"),
            Err(e) => tracing::error!(
                item_id = %item_id,
                error = %e,
                "Failed to delete media item record"
            ),
        }
    }

    async fn delete_local_file(&self, item: &MediaItem) {
        let Some(source) = item.local_path.as_deref() else {
            return;
        };
        if is_platform_handle(source) {
            tracing::debug!(item_id = %item.id, "Keeping platform media asset");
            return;
        }

        let path = local_file_path(source);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                item_id = %item.id,
                path = %path.display(),
                error = %e,
                "Failed to delete local file"
            ),
        }
    }

    async fn delete_intake_object(&self, item: &MediaItem) {
        let Some(key) = item.storage_path.as_deref() else {
            return;
        };
        if let Err(e) = self.ctx.buckets.intake.delete(key).await {
            tracing::error!(
                item_id = %item.id,
                bucket = self.ctx.buckets.intake.bucket(),
                storage_key = %key,
                error = %e,
                "Failed to delete intake object"
            );
        }
    }
}
