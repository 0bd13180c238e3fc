//! Upload engine: durably copies an item's local bytes to the intake bucket.
//!
//! An item reaches `synced` only after both the object write and the
//! relational record update succeed. Exhausted retries leave the item in
//! `failed` with its local file intact so it can be retried.

use fieldsync_core::models::{MediaItem, SyncStatus};
use fieldsync_core::SyncError;
use fieldsync_db::SyncStateUpdate;
use fieldsync_storage::{is_platform_handle, keys, local_file_path, Storage, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::EngineContext;
use crate::events::SyncEvent;
use crate::retry;
use crate::store::BeginSync;

/// Turn an item's byte source into a readable path.
///
/// Opaque platform handles go through the resolver; anything else is taken
/// as a filesystem path. No network I/O happens here.
pub(crate) async fn resolve_source(
    ctx: &EngineContext,
    source: &str,
) -> Result<PathBuf, SyncError> {
    if !is_platform_handle(source) {
        return Ok(local_file_path(source));
    }
    ctx.resolver
        .resolve(source)
        .await
        .map_err(|e| SyncError::Resolution {
            handle: source.to_string(),
            reason: e.to_string(),
        })
}

/// One transfer of a file into a bucket, holding a transfer permit.
pub(crate) async fn upload_with_permit(
    ctx: &EngineContext,
    storage: &dyn Storage,
    key: &str,
    path: &Path,
    content_type: &str,
) -> Result<u64, StorageError> {
    let _permit = ctx
        .transfer_permit()
        .await
        .ok_or_else(|| StorageError::BackendError("transfer pool closed".to_string()))?;
    storage.upload_file(key, path, content_type).await
}

#[derive(Clone)]
pub struct UploadEngine {
    ctx: Arc<EngineContext>,
}

impl UploadEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Sync one item to the intake bucket.
    ///
    /// A `synced` item is returned as is. If an upload for the item is already
    /// running, this waits for it to settle instead of starting another.
    #[tracing::instrument(skip(self))]
    pub async fn upload_item(&self, item_id: Uuid) -> Result<MediaItem, SyncError> {
        let item = match self.ctx.store.begin_sync(item_id)? {
            BeginSync::AlreadySynced(item) => return Ok(item),
            BeginSync::InFlight => return self.await_in_flight(item_id).await,
            BeginSync::Started(item) => item,
        };
        self.status_changed(item_id, SyncStatus::Syncing).await;

        let start = Instant::now();
        let (remote_locator, storage_path) = match self.transfer_to_intake(&item).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                self.settle_failed(item_id, &e).await;
                return Err(e);
            }
        };

        let update = SyncStateUpdate::synced(remote_locator.clone(), storage_path.clone());
        if let Err(e) = self.ctx.items.update_sync_state(item_id, &update).await {
            let err = SyncError::Persistence(e);
            self.discard_intake_copy(item_id, &storage_path).await;
            self.settle_failed(item_id, &err).await;
            return Err(err);
        }

        let synced = match self
            .ctx
            .store
            .complete_sync(item_id, remote_locator, storage_path.clone())
        {
            Ok(synced) => synced,
            Err(e @ SyncError::ItemNotFound(_)) => {
                // Deleted while uploading
                self.discard_intake_copy(item_id, &storage_path).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.ctx.events.publish(SyncEvent::StatusChanged {
            item_id,
            status: SyncStatus::Synced,
        });

        tracing::info!(
            item_id = %item_id,
            storage_path = ?synced.storage_path,
            duration_ms = start.elapsed().as_millis() as u64,
            "Media item synced"
        );

        Ok(synced)
    }

    /// Run [`Self::upload_item`] on a detached task.
    ///
    /// Failures are logged and published as `SyncEvent::BackgroundSyncFailed`.
    pub fn spawn_background_sync(&self, item_id: Uuid) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.upload_item(item_id).await {
                tracing::error!(
                    item_id = %item_id,
                    error = %e,
                    error_code = e.error_code(),
                    "Background sync failed"
                );
                engine.ctx.events.publish(SyncEvent::BackgroundSyncFailed {
                    item_id,
                    error: e.to_string(),
                });
            }
        })
    }

    /// Resolve, then upload with retries. Returns `(locator, key)`.
    async fn transfer_to_intake(&self, item: &MediaItem) -> Result<(String, String), SyncError> {
        let source = item
            .local_path
            .as_deref()
            .ok_or(SyncError::NoSource(item.id))?;
        let path = resolve_source(&self.ctx, source).await?;

        let ctx = self.ctx.as_ref();
        let storage = self.ctx.buckets.intake.as_ref();
        let key = keys::intake_key(item.owner_id, item.id);
        let key_ref = key.as_str();
        let path_ref = path.as_path();
        let mime = item.mime_type();

        let written = retry::with_backoff(&self.ctx.config, "intake_upload", move |_| {
            upload_with_permit(ctx, storage, key_ref, path_ref, mime)
        })
        .await?;

        tracing::debug!(
            item_id = %item.id,
            bucket = storage.bucket(),
            key = %key,
            size_bytes = written,
            "Intake upload complete"
        );

        let locator = storage
            .public_url(&key)
            .await
            .map_err(|e| SyncError::Transfer {
                attempts: 1,
                message: format!("failed to resolve public URL: {}", e),
            })?;

        Ok((locator, key))
    }

    async fn await_in_flight(&self, item_id: Uuid) -> Result<MediaItem, SyncError> {
        tracing::debug!(item_id = %item_id, "Upload already in flight, waiting");
        let settled = self
            .ctx
            .store
            .wait_for_settled(item_id, self.ctx.config.sync_wait_timeout)
            .await?
            .ok_or(SyncError::ItemNotFound(item_id))?;

        match settled.sync_status {
            SyncStatus::Synced => Ok(settled),
            _ => Err(SyncError::Transfer {
                attempts: self.ctx.config.upload_max_attempts,
                message: "concurrent upload of the item failed".to_string(),
            }),
        }
    }

    /// Remove an intake object no record points at. Failures are logged only.
    async fn discard_intake_copy(&self, item_id: Uuid, key: &str) {
        let intake = &self.ctx.buckets.intake;
        if let Err(e) = intake.delete(key).await {
            let err = SyncError::Compensation {
                key: format!("{}/{}", intake.bucket(), key),
                message: e.to_string(),
            };
            tracing::error!(
                item_id = %item_id,
                error = %err,
                error_code = err.error_code(),
                "Failed to discard orphaned intake object"
            );
        }
    }

    async fn settle_failed(&self, item_id: Uuid, cause: &SyncError) {
        tracing::warn!(
            item_id = %item_id,
            error = %cause,
            error_code = cause.error_code(),
            "Media item sync failed"
        );
        match self.ctx.store.fail_sync(item_id) {
            Ok(_) => self.status_changed(item_id, SyncStatus::Failed).await,
            Err(e) => {
                tracing::warn!(item_id = %item_id, error = %e, "Could not mark item failed")
            }
        }
    }

    /// Publish a status change and mirror it to the record, best effort.
    async fn status_changed(&self, item_id: Uuid, status: SyncStatus) {
        self.ctx
            .events
            .publish(SyncEvent::StatusChanged { item_id, status });
        if let Err(e) = self
            .ctx
            .items
            .update_sync_state(item_id, &SyncStateUpdate::status(status))
            .await
        {
            tracing::warn!(
                item_id = %item_id,
                status = %status,
                error = %e,
                "Failed to persist sync status"
            );
        }
    }
}
