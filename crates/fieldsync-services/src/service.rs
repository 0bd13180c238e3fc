//! `MediaSyncService`: the engine's caller-facing API.
//!
//! Constructed once with its backends injected. Reads (`list`, `filter`,
//! `get`) are synchronous snapshots of the in-memory store; everything that
//! touches a backend is async.

use fieldsync_core::models::{AssignmentResult, MediaItem, NewMediaItem, SyncStatus};
use fieldsync_core::{SyncConfig, SyncError};
use fieldsync_db::SyncStateUpdate;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::assignment::AssignmentCoordinator;
use crate::context::{EngineContext, EngineDeps};
use crate::events::SyncEvent;
use crate::lifecycle::MediaLifecycleService;
use crate::query::{FilterState, MediaFilter};
use crate::upload::UploadEngine;

#[derive(Clone)]
pub struct MediaSyncService {
    ctx: Arc<EngineContext>,
    uploads: UploadEngine,
    coordinator: AssignmentCoordinator,
    lifecycle: MediaLifecycleService,
}

impl MediaSyncService {
    pub fn new(deps: EngineDeps, config: SyncConfig) -> Self {
        let ctx = Arc::new(EngineContext::new(deps, config));
        let uploads = UploadEngine::new(ctx.clone());
        Self {
            coordinator: AssignmentCoordinator::new(ctx.clone(), uploads.clone()),
            lifecycle: MediaLifecycleService::new(ctx.clone()),
            uploads,
            ctx,
        }
    }

    /// Replace the in-memory snapshot with the owner's persisted items.
    pub async fn load(&self, owner_id: Uuid) -> Result<usize, SyncError> {
        let items = self.ctx.items.list_by_owner(owner_id).await?;
        let count = items.len();
        let interrupted = self.ctx.store.replace_all(items);

        let failed = SyncStateUpdate::status(SyncStatus::Failed);
        for item_id in &interrupted {
            if let Err(e) = self.ctx.items.update_sync_state(*item_id, &failed).await {
                tracing::warn!(
                    item_id = %item_id,
                    error = %e,
                    "Failed to persist recovery of interrupted sync"
                );
            }
        }

        tracing::info!(
            owner_id = %owner_id,
            items = count,
            interrupted_syncs = interrupted.len(),
            "Media items loaded"
        );
        Ok(count)
    }

    /// Register a freshly captured asset as a `pending`, local-only item.
    pub async fn capture(&self, new: NewMediaItem) -> Result<MediaItem, SyncError> {
        if new.file_name.trim().is_empty() {
            return Err(SyncError::InvalidRequest("file name is empty".to_string()));
        }
        if new.local_path.trim().is_empty() {
            return Err(SyncError::InvalidRequest("local path is empty".to_string()));
        }

        let item = MediaItem::from_capture(new);
        self.ctx.items.insert(&item).await?;
        self.ctx.store.insert(item.clone());

        tracing::info!(
            item_id = %item.id,
            owner_id = %item.owner_id,
            media_type = ?item.media_type,
            "Media item captured"
        );
        Ok(item)
    }

    pub fn get(&self, item_id: Uuid) -> Option<MediaItem> {
        self.ctx.store.get(item_id)
    }

    /// All items, newest first.
    pub fn list(&self) -> Vec<MediaItem> {
        self.ctx.store.list()
    }

    pub fn filter(&self, filter: &MediaFilter) -> Vec<MediaItem> {
        filter.apply(&self.ctx.store.list())
    }

    /// A filter editor using the configured search debounce.
    pub fn filter_state(&self) -> FilterState {
        FilterState::new(self.ctx.config.search_debounce)
    }

    pub async fn assign(
        &self,
        item_ids: &[Uuid],
        ticket_id: &str,
    ) -> Result<AssignmentResult, SyncError> {
        self.coordinator.assign(item_ids, ticket_id).await
    }

    /// [`Self::assign`], plus handles to the background syncs it scheduled.
    pub async fn assign_with_followups(
        &self,
        item_ids: &[Uuid],
        ticket_id: &str,
    ) -> Result<(AssignmentResult, Vec<JoinHandle<()>>), SyncError> {
        self.coordinator
            .assign_with_followups(item_ids, ticket_id)
            .await
    }

    pub async fn delete(&self, item_id: Uuid) {
        self.lifecycle.delete(item_id).await
    }

    /// Sync an item to the intake bucket; also the manual retry for `failed`.
    pub async fn upload_item(&self, item_id: Uuid) -> Result<MediaItem, SyncError> {
        self.uploads.upload_item(item_id).await
    }

    pub fn spawn_background_sync(&self, item_id: Uuid) -> JoinHandle<()> {
        self.uploads.spawn_background_sync(item_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.ctx.events.subscribe()
    }
}
