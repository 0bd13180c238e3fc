//! Postgres repositories for `media_items` and `attachments`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldsync_core::models::{
    Attachment, MediaItem, MediaType, NewAttachment, SyncStatus, TicketLinkage,
};
use fieldsync_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::repository::{AttachmentRepository, MediaItemRepository, SyncStateUpdate};

/// Embedded migrations for both tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const MEDIA_ITEM_COLUMNS: &str = "id, owner_id, media_type, file_name, local_path, remote_locator, \
     storage_path, file_size_bytes, duration_seconds, width, height, metadata, sync_status, \
     ticket_id, attachment_id, assigned_at, created_at, updated_at";

/// Row type for media_items table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct MediaItemRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub media_type: MediaType,
    pub file_name: String,
    pub local_path: Option<String>,
    pub remote_locator: Option<String>,
    pub storage_path: Option<String>,
    pub file_size_bytes: i64,
    pub duration_seconds: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub metadata: Json<BTreeMap<String, String>>,
    pub sync_status: SyncStatus,
    pub ticket_id: Option<String>,
    pub attachment_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItemRow {
    pub fn into_media_item(self) -> MediaItem {
        // The table constraint keeps the three linkage columns null or set together
        let linkage = match (self.ticket_id, self.attachment_id, self.assigned_at) {
            (Some(ticket_id), Some(attachment_id), Some(assigned_at)) => Some(TicketLinkage {
                ticket_id,
                attachment_id,
                assigned_at,
            }),
            _ => None,
        };

        MediaItem {
            id: self.id,
            owner_id: self.owner_id,
            media_type: self.media_type,
            file_name: self.file_name,
            local_path: self.local_path,
            remote_locator: self.remote_locator,
            storage_path: self.storage_path,
            file_size_bytes: self.file_size_bytes,
            duration_seconds: self.duration_seconds,
            width: self.width,
            height: self.height,
            metadata: self.metadata.0,
            sync_status: self.sync_status,
            linkage,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for media_items table.
#[derive(Clone)]
pub struct PgMediaItemRepository {
    pool: PgPool,
}

impl PgMediaItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM media_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl MediaItemRepository for PgMediaItemRepository {
    #[tracing::instrument(skip(self, item), fields(db.table = "media_items", db.operation = "insert", db.record_id = %item.id))]
    async fn insert(&self, item: &MediaItem) -> Result<(), AppError> {
        let linkage = item.linkage.as_ref();
        sqlx::query(
            r#"
            INSERT INTO media_items (
                id, owner_id, media_type, file_name, local_path, remote_locator,
                storage_path, file_size_bytes, duration_seconds, width, height,
                metadata, sync_status, ticket_id, attachment_id, assigned_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(item.id)
        .bind(item.owner_id)
        .bind(item.media_type)
        .bind(&item.file_name)
        .bind(&item.local_path)
        .bind(&item.remote_locator)
        .bind(&item.storage_path)
        .bind(item.file_size_bytes)
        .bind(item.duration_seconds)
        .bind(item.width)
        .bind(item.height)
        .bind(Json(&item.metadata))
        .bind(item.sync_status)
        .bind(linkage.map(|l| l.ticket_id.clone()))
        .bind(linkage.map(|l| l.attachment_id))
        .bind(linkage.map(|l| l.assigned_at))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>, AppError> {
        let query = format!("SELECT {} FROM media_items WHERE id = $1", MEDIA_ITEM_COLUMNS);
        let row: Option<MediaItemRow> = sqlx::query_as::<Postgres, MediaItemRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MediaItemRow::into_media_item))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select"))]
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaItem>, AppError> {
        let query = format!(
            "SELECT {} FROM media_items WHERE owner_id = $1 ORDER BY created_at DESC",
            MEDIA_ITEM_COLUMNS
        );
        let rows: Vec<MediaItemRow> = sqlx::query_as::<Postgres, MediaItemRow>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(MediaItemRow::into_media_item).collect())
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "media_items", db.operation = "update", db.record_id = %id, sync_status = %update.status))]
    async fn update_sync_state(&self, id: Uuid, update: &SyncStateUpdate) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE media_items
            SET sync_status = $2,
                remote_locator = COALESCE($3, remote_locator),
                storage_path = COALESCE($4, storage_path),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.remote_locator)
        .bind(&update.storage_path)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Media item {} not found", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, linkage), fields(db.table = "media_items", db.operation = "update", db.record_id = %id, ticket_id = %linkage.ticket_id))]
    async fn set_linkage(&self, id: Uuid, linkage: &TicketLinkage) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE media_items
            SET ticket_id = $2, attachment_id = $3, assigned_at = $4, updated_at = NOW()
            WHERE id = $1 AND ticket_id IS NULL
            "#,
        )
        .bind(id)
        .bind(&linkage.ticket_id)
        .bind(linkage.attachment_id)
        .bind(linkage.assigned_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.exists(id).await? {
                return Err(AppError::Conflict(format!(
                    "Media item {} is already assigned",
                    id
                )));
            }
            return Err(AppError::NotFound(format!("Media item {} not found", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows_affected = sqlx::query("DELETE FROM media_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}

/// Repository for attachments table.
#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "attachments", db.operation = "insert", ticket_id = %new.ticket_id))]
    async fn create(&self, new: &NewAttachment) -> Result<Attachment, AppError> {
        let row: Attachment = sqlx::query_as::<Postgres, Attachment>(
            r#"
            INSERT INTO attachments (
                ticket_id, storage_path, original_name, file_size, mime_type,
                category, uploaded_by, uploaded_at, processed, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, $9)
            RETURNING id, ticket_id, storage_path, original_name, file_size, mime_type,
                      category, uploaded_by, uploaded_at, processed, source
            "#,
        )
        .bind(&new.ticket_id)
        .bind(&new.storage_path)
        .bind(&new.original_name)
        .bind(new.file_size)
        .bind(&new.mime_type)
        .bind(&new.category)
        .bind(new.uploaded_by)
        .bind(new.uploaded_at)
        .bind(&new.source)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attachments", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Attachment>, AppError> {
        let row = sqlx::query_as::<Postgres, Attachment>(
            r#"
            SELECT id, ticket_id, storage_path, original_name, file_size, mime_type,
                   category, uploaded_by, uploaded_at, processed, source
            FROM attachments WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attachments", db.operation = "select"))]
    async fn list_by_ticket(&self, ticket_id: &str) -> Result<Vec<Attachment>, AppError> {
        let rows = sqlx::query_as::<Postgres, Attachment>(
            r#"
            SELECT id, ticket_id, storage_path, original_name, file_size, mime_type,
                   category, uploaded_by, uploaded_at, processed, source
            FROM attachments WHERE ticket_id = $1 ORDER BY uploaded_at ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attachments", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows_affected = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}
