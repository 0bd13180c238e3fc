#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use fieldsync_core::models::MediaCategory;
use fieldsync_core::StorageConfig;
use std::sync::Arc;

/// The three logical buckets the engine writes to.
#[derive(Clone)]
pub struct Buckets {
    /// Generic intake bucket for media not yet linked to a ticket.
    pub intake: Arc<dyn Storage>,
    /// Ticket bucket for photos and videos.
    pub ticket_media: Arc<dyn Storage>,
    /// Ticket bucket for audio recordings.
    pub ticket_audio: Arc<dyn Storage>,
}

impl Buckets {
    pub fn new(
        intake: Arc<dyn Storage>,
        ticket_media: Arc<dyn Storage>,
        ticket_audio: Arc<dyn Storage>,
    ) -> Self {
        Self {
            intake,
            ticket_media,
            ticket_audio,
        }
    }

    /// Ticket-scoped bucket for a media category.
    pub fn ticket_bucket(&self, category: MediaCategory) -> &Arc<dyn Storage> {
        if category.is_audio() {
            &self.ticket_audio
        } else {
            &self.ticket_media
        }
    }
}

/// Create the bucket set based on configuration
pub async fn create_buckets(config: &StorageConfig) -> StorageResult<Buckets> {
    Ok(Buckets {
        intake: create_storage(config, &config.intake_bucket).await?,
        ticket_media: create_storage(config, &config.ticket_media_bucket).await?,
        ticket_audio: create_storage(config, &config.ticket_audio_bucket).await?,
    })
}

async fn create_storage(config: &StorageConfig, bucket: &str) -> StorageResult<Arc<dyn Storage>> {
    match config.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let storage =
                S3Storage::new(bucket.to_string(), region, config.s3_endpoint.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(
                config.local_storage_path.clone(),
                config.local_storage_base_url.clone(),
                bucket,
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
