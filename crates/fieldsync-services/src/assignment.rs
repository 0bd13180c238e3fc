//! Assignment coordinator.
//!
//! Moves media items into ticket-scoped storage and links them to a ticket.
//! The batch is checked up front (all or nothing, before any I/O); after that
//! every item is processed independently:
//!
//! 1. pick a byte source (local file first, else the intake copy)
//! 2. resolve platform handles
//! 3. upload to the ticket bucket for the item's category
//! 4. create the attachment record, deleting the object if that fails
//! 5. write the linkage, undoing 3-4 if that fails
//! 6. remove any temporary download
//!
//! Items that still have no intake copy afterwards get a background sync.

use chrono::Utc;
use fieldsync_core::constants::ATTACHMENT_SOURCE_FIELD_CAPTURE;
use fieldsync_core::models::{
    AssignedItem, AssignmentResult, FailedItem, MediaItem, NewAttachment, TicketLinkage,
};
use fieldsync_core::{LogLevel, SyncError};
use fieldsync_storage::{is_platform_handle, keys, local_file_path, Storage};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::EngineContext;
use crate::events::SyncEvent;
use crate::retry;
use crate::upload::{resolve_source, upload_with_permit, UploadEngine};

/// Bytes staged for the ticket upload.
struct StagedSource {
    path: PathBuf,
    /// Set when the bytes were downloaded for this assignment only.
    temp_dir: Option<TempDir>,
}

impl StagedSource {
    fn original(path: PathBuf) -> Self {
        Self {
            path,
            temp_dir: None,
        }
    }

    /// Remove the temporary download, if any. Never touches an original file.
    fn cleanup(self, item_id: Uuid) {
        if let Some(dir) = self.temp_dir {
            let dir_path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(
                    item_id = %item_id,
                    path = %dir_path.display(),
                    error = %e,
                    "Failed to remove temporary download"
                );
            }
        }
    }
}

#[derive(Clone)]
pub struct AssignmentCoordinator {
    ctx: Arc<EngineContext>,
    uploads: UploadEngine,
}

impl AssignmentCoordinator {
    pub fn new(ctx: Arc<EngineContext>, uploads: UploadEngine) -> Self {
        Self { ctx, uploads }
    }

    /// Assign items to `ticket_id`.
    ///
    /// Fails as a whole only on precondition violations (unknown item, or any
    /// item already assigned). Otherwise returns the per-item outcome.
    pub async fn assign(
        &self,
        item_ids: &[Uuid],
        ticket_id: &str,
    ) -> Result<AssignmentResult, SyncError> {
        let (result, _) = self.assign_with_followups(item_ids, ticket_id).await?;
        Ok(result)
    }

    /// Like [`Self::assign`], also returning the handles of the background
    /// syncs it scheduled.
    pub async fn assign_with_followups(
        &self,
        item_ids: &[Uuid],
        ticket_id: &str,
    ) -> Result<(AssignmentResult, Vec<JoinHandle<()>>), SyncError> {
        let ticket_id = ticket_id.trim();
        if ticket_id.is_empty() {
            return Err(SyncError::InvalidRequest("ticket id is empty".to_string()));
        }
        if item_ids.is_empty() {
            return Ok((AssignmentResult::new(ticket_id), Vec::new()));
        }

        let batch = match self.ctx.store.reserve_for_assignment(item_ids) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::info!(
                    ticket_id = %ticket_id,
                    items = item_ids.len(),
                    error = %e,
                    "Assignment rejected"
                );
                return Err(e);
            }
        };
        let ids: Vec<Uuid> = batch.iter().map(|item| item.id).collect();

        tracing::info!(
            ticket_id = %ticket_id,
            items = ids.len(),
            "Assigning media items to ticket"
        );

        let mut outcomes: HashMap<Uuid, Result<AssignedItem, SyncError>> = stream::iter(batch)
            .map(|item| async move {
                let id = item.id;
                (id, self.assign_one(item, ticket_id).await)
            })
            .buffer_unordered(self.ctx.config.max_concurrent_transfers.max(1))
            .collect()
            .await;

        self.ctx.store.release(&ids);

        let mut result = AssignmentResult::new(ticket_id);
        for id in &ids {
            match outcomes.remove(id) {
                Some(Ok(assigned)) => result.succeeded.push(assigned),
                Some(Err(e)) => {
                    log_item_failure(*id, ticket_id, &e);
                    result.failed.push(FailedItem {
                        item_id: *id,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
                None => {}
            }
        }

        let followups = self.schedule_background_syncs(&ids);

        tracing::info!(
            ticket_id = %ticket_id,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            background_syncs = followups.len(),
            "Assignment finished"
        );

        Ok((result, followups))
    }

    async fn assign_one(&self, item: MediaItem, ticket_id: &str) -> Result<AssignedItem, SyncError> {
        // Re-read: the snapshot may predate a finished sync
        let item = self.ctx.store.get(item.id).unwrap_or(item);
        let staged = self.stage_source(&item).await?;
        let outcome = self.migrate(&item, ticket_id, &staged.path).await;
        staged.cleanup(item.id);
        outcome
    }

    /// Pick and prepare the byte source.
    ///
    /// A present local file (or platform handle) always wins. Otherwise the
    /// intake copy is downloaded, after waiting out a running sync if needed.
    async fn stage_source(&self, item: &MediaItem) -> Result<StagedSource, SyncError> {
        if let Some(source) = item.local_path.as_deref() {
            let present = is_platform_handle(source)
                || tokio::fs::try_exists(local_file_path(source))
                    .await
                    .unwrap_or(false);
            if present {
                return Ok(StagedSource::original(resolve_source(&self.ctx, source).await?));
            }
            tracing::warn!(
                item_id = %item.id,
                local_path = %source,
                has_intake_copy = item.has_intake_copy(),
                sync_in_flight = item.sync_status.is_in_flight(),
                "Local file is gone, falling back to the intake copy"
            );
        }

        let current = if item.sync_status.is_in_flight() {
            self.ctx
                .store
                .wait_until(item.id, self.ctx.config.sync_wait_timeout, |i| {
                    !i.sync_status.is_in_flight()
                })
                .await?
                .ok_or(SyncError::ItemNotFound(item.id))?
        } else {
            item.clone()
        };

        let key = current
            .storage_path
            .clone()
            .ok_or(SyncError::NoSource(item.id))?;
        self.download_intake_copy(item.id, &key).await
    }

    async fn download_intake_copy(&self, item_id: Uuid, key: &str) -> Result<StagedSource, SyncError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("fieldsync-");
        let dir = match &self.ctx.config.temp_dir {
            Some(base) => {
                tokio::fs::create_dir_all(base).await?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        let dest = dir.path().join(item_id.to_string());

        let written = {
            let _permit = self.ctx.transfer_permit().await;
            self.ctx.buckets.intake.download_to_file(key, &dest).await
        };
        match written {
            Ok(bytes) => {
                tracing::debug!(
                    item_id = %item_id,
                    key = %key,
                    size_bytes = bytes,
                    "Downloaded intake copy for assignment"
                );
                Ok(StagedSource {
                    path: dest,
                    temp_dir: Some(dir),
                })
            }
            Err(e) => {
                StagedSource {
                    path: dest,
                    temp_dir: Some(dir),
                }
                .cleanup(item_id);
                Err(SyncError::Transfer {
                    attempts: 1,
                    message: format!("download of {} failed: {}", key, e),
                })
            }
        }
    }

    /// Upload, record, link.
    async fn migrate(
        &self,
        item: &MediaItem,
        ticket_id: &str,
        path: &Path,
    ) -> Result<AssignedItem, SyncError> {
        let category = item.media_type.category();
        let bucket = self.ctx.buckets.ticket_bucket(category).clone();
        let key = keys::ticket_key(ticket_id, item.id, &item.file_name);

        let ctx = self.ctx.as_ref();
        let storage = bucket.as_ref();
        let key_ref = key.as_str();
        let mime = item.mime_type();
        let written = retry::with_backoff(&self.ctx.config, "ticket_upload", move |_| {
            upload_with_permit(ctx, storage, key_ref, path, mime)
        })
        .await?;

        let new_attachment = NewAttachment {
            ticket_id: ticket_id.to_string(),
            storage_path: key.clone(),
            original_name: item.original_name().to_string(),
            file_size: i64::try_from(written).unwrap_or(item.file_size_bytes),
            mime_type: mime.to_string(),
            category: category.tag().to_string(),
            uploaded_by: item.owner_id,
            uploaded_at: Utc::now(),
            source: ATTACHMENT_SOURCE_FIELD_CAPTURE.to_string(),
        };

        let attachment = match self.ctx.attachments.create(&new_attachment).await {
            Ok(attachment) => attachment,
            Err(e) => {
                self.compensate_object(&bucket, &key).await;
                return Err(SyncError::Persistence(e));
            }
        };

        let linkage = TicketLinkage {
            ticket_id: ticket_id.to_string(),
            attachment_id: attachment.id,
            assigned_at: attachment.uploaded_at,
        };
        if let Err(e) = self.ctx.items.set_linkage(item.id, &linkage).await {
            self.compensate_attachment(attachment.id).await;
            self.compensate_object(&bucket, &key).await;
            return Err(SyncError::Persistence(e));
        }

        if self.ctx.store.apply_linkage(item.id, linkage)?.is_none() {
            tracing::warn!(item_id = %item.id, "Item left the store during assignment");
        }
        self.ctx.events.publish(SyncEvent::Assigned {
            item_id: item.id,
            ticket_id: ticket_id.to_string(),
            attachment_id: attachment.id,
        });

        tracing::info!(
            item_id = %item.id,
            ticket_id = %ticket_id,
            attachment_id = %attachment.id,
            bucket = bucket.bucket(),
            key = %key,
            "Media item assigned"
        );

        Ok(AssignedItem {
            item_id: item.id,
            attachment_id: attachment.id,
            storage_path: key,
        })
    }

    /// Best-effort delete of an object written by this assignment.
    async fn compensate_object(&self, bucket: &Arc<dyn Storage>, key: &str) {
        if let Err(e) = bucket.delete(key).await {
            let err = SyncError::Compensation {
                key: format!("{}/{}", bucket.bucket(), key),
                message: e.to_string(),
            };
            tracing::error!(
                error = %err,
                error_code = err.error_code(),
                "Compensating delete failed, object may be orphaned"
            );
        }
    }

    async fn compensate_attachment(&self, attachment_id: Uuid) {
        if let Err(e) = self.ctx.attachments.delete(attachment_id).await {
            let err = SyncError::Compensation {
                key: format!("attachment {}", attachment_id),
                message: e.to_string(),
            };
            tracing::error!(
                error = %err,
                error_code = err.error_code(),
                "Compensating attachment delete failed"
            );
        }
    }

    fn schedule_background_syncs(&self, ids: &[Uuid]) -> Vec<JoinHandle<()>> {
        ids.iter()
            .filter_map(|id| self.ctx.store.get(*id))
            .filter(|item| {
                !item.has_intake_copy()
                    && item.local_path.is_some()
                    && !item.sync_status.is_in_flight()
            })
            .map(|item| {
                tracing::debug!(item_id = %item.id, "Scheduling background sync");
                self.uploads.spawn_background_sync(item.id)
            })
            .collect()
    }
}

fn log_item_failure(item_id: Uuid, ticket_id: &str, e: &SyncError) {
    match e.log_level() {
        LogLevel::Debug => {
            tracing::debug!(item_id = %item_id, ticket_id = %ticket_id, error = %e, "Item not assigned")
        }
        LogLevel::Warn => {
            tracing::warn!(item_id = %item_id, ticket_id = %ticket_id, error = %e, "Item not assigned")
        }
        LogLevel::Error => {
            tracing::error!(item_id = %item_id, ticket_id = %ticket_id, error = %e, "Item not assigned")
        }
    }
}
