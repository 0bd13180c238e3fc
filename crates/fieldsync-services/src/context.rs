//! Shared dependencies of the engine components.

use fieldsync_core::SyncConfig;
use fieldsync_db::{AttachmentRepository, MediaItemRepository};
use fieldsync_storage::{Buckets, UriResolver};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::events::EventBus;
use crate::store::MediaStore;

/// Injected backends for [`crate::MediaSyncService`].
#[derive(Clone)]
pub struct EngineDeps {
    pub items: Arc<dyn MediaItemRepository>,
    pub attachments: Arc<dyn AttachmentRepository>,
    pub buckets: Buckets,
    pub resolver: Arc<dyn UriResolver>,
}

/// Everything the upload engine, coordinator and lifecycle service share.
pub struct EngineContext {
    pub store: MediaStore,
    pub items: Arc<dyn MediaItemRepository>,
    pub attachments: Arc<dyn AttachmentRepository>,
    pub buckets: Buckets,
    pub resolver: Arc<dyn UriResolver>,
    pub events: EventBus,
    pub config: SyncConfig,
    transfer_permits: Semaphore,
}

impl EngineContext {
    pub fn new(deps: EngineDeps, config: SyncConfig) -> Self {
        let permits = config.max_concurrent_transfers.max(1);
        Self {
            store: MediaStore::new(),
            items: deps.items,
            attachments: deps.attachments,
            buckets: deps.buckets,
            resolver: deps.resolver,
            events: EventBus::new(),
            config,
            transfer_permits: Semaphore::new(permits),
        }
    }

    /// Wait for a transfer slot. Held only around network transfers, never
    /// around waits on other items, so slots cannot deadlock.
    pub async fn transfer_permit(&self) -> Option<SemaphorePermit<'_>> {
        self.transfer_permits.acquire().await.ok()
    }
}
