//! Fault-injecting wrappers around the real in-memory and local backends.

use async_trait::async_trait;
use fieldsync_core::models::{Attachment, MediaItem, NewAttachment, TicketLinkage};
use fieldsync_core::AppError;
use fieldsync_db::{
    AttachmentRepository, InMemoryAttachmentRepository, InMemoryMediaItemRepository,
    MediaItemRepository, SyncStateUpdate,
};
use fieldsync_storage::{ByteReader, Storage, StorageBackend, StorageError, StorageResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Counts calls and can fail or slow down uploads and deletes on demand.
pub struct InstrumentedStorage {
    inner: Arc<dyn Storage>,
    uploads: AtomicU32,
    downloads: AtomicU32,
    deletes: AtomicU32,
    failing_uploads: AtomicBool,
    failing_deletes: AtomicBool,
    upload_delay_ms: AtomicU64,
}

impl InstrumentedStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            uploads: AtomicU32::new(0),
            downloads: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
            failing_uploads: AtomicBool::new(false),
            failing_deletes: AtomicBool::new(false),
            upload_delay_ms: AtomicU64::new(0),
        })
    }

    /// Hold every upload for `delay` after its source is opened.
    pub fn delay_uploads(&self, delay: Duration) {
        self.upload_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, on: bool) {
        self.failing_uploads.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.failing_deletes.store(on, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> u32 {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u32 {
        self.uploads() + self.downloads() + self.deletes()
    }
}

#[async_trait]
impl Storage for InstrumentedStorage {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }

    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ByteReader,
    ) -> StorageResult<u64> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.failing_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("injected upload failure".into()));
        }
        let delay = self.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner
            .upload_stream(storage_key, content_type, content_length, reader)
            .await
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download(storage_key).await
    }

    async fn download_stream(
        &self,
        storage_key: &str,
    ) -> StorageResult<fieldsync_storage::traits::ByteStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download_stream(storage_key).await
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed("injected delete failure".into()));
        }
        self.inner.delete(storage_key).await
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    async fn public_url(&self, storage_key: &str) -> StorageResult<String> {
        self.inner.public_url(storage_key).await
    }
}

/// Media item repository that can fail linkage or sync-state writes.
#[derive(Default)]
pub struct FaultyItems {
    pub inner: InMemoryMediaItemRepository,
    failing_linkage: Mutex<HashSet<Uuid>>,
    failing_sync_updates: AtomicBool,
    failing_deletes: AtomicBool,
    writes: AtomicU32,
}

impl FaultyItems {
    pub fn fail_linkage_for(&self, item_id: Uuid) {
        self.failing_linkage.lock().unwrap().insert(item_id);
    }

    pub fn fail_sync_updates(&self, on: bool) {
        self.failing_sync_updates.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.failing_deletes.store(on, Ordering::SeqCst);
    }

    /// Calls that write to the table, successful or not.
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaItemRepository for FaultyItems {
    async fn insert(&self, item: &MediaItem) -> Result<(), AppError> {
        self.inner.insert(item).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaItem>, AppError> {
        self.inner.get(id).await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaItem>, AppError> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn update_sync_state(&self, id: Uuid, update: &SyncStateUpdate) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_sync_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected sync update failure".into()));
        }
        self.inner.update_sync_state(id, update).await
    }

    async fn set_linkage(&self, id: Uuid, linkage: &TicketLinkage) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_linkage.lock().unwrap().contains(&id) {
            return Err(AppError::Internal("injected linkage failure".into()));
        }
        self.inner.set_linkage(id, linkage).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected delete failure".into()));
        }
        self.inner.delete(id).await
    }
}

/// Attachment repository that fails `create` for chosen original names.
#[derive(Default)]
pub struct FaultyAttachments {
    pub inner: InMemoryAttachmentRepository,
    failing_names: Mutex<HashSet<String>>,
    creates: AtomicU32,
}

impl FaultyAttachments {
    pub fn fail_create_for(&self, original_name: &str) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(original_name.to_string());
    }

    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttachmentRepository for FaultyAttachments {
    async fn create(&self, new: &NewAttachment) -> Result<Attachment, AppError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.failing_names.lock().unwrap().contains(&new.original_name) {
            return Err(AppError::Internal("injected attachment failure".into()));
        }
        self.inner.create(new).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Attachment>, AppError> {
        self.inner.get(id).await
    }

    async fn list_by_ticket(&self, ticket_id: &str) -> Result<Vec<Attachment>, AppError> {
        self.inner.list_by_ticket(ticket_id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete(id).await
    }
}
