//! Test helpers: an engine over local-filesystem buckets and in-memory
//! repositories, with fault injection on every backend.
//!
//! Run with: `cargo test -p fieldsync-services`

#![allow(dead_code)]

pub mod faults;

use faults::{FaultyAttachments, FaultyItems, InstrumentedStorage};
use fieldsync_core::models::{MediaItem, MediaType, NewMediaItem};
use fieldsync_core::SyncConfig;
use fieldsync_services::{EngineDeps, MediaSyncService};
use fieldsync_storage::{Buckets, LocalStorage, StaticUriResolver, Storage};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const BASE_URL: &str = "http://localhost:3000/storage";

/// Retry timing shrunk so failure paths run fast.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        upload_backoff_base: Duration::from_millis(1),
        sync_wait_timeout: Duration::from_secs(2),
        ..SyncConfig::default()
    }
}

pub struct TestEngine {
    pub service: MediaSyncService,
    pub items: Arc<FaultyItems>,
    pub attachments: Arc<FaultyAttachments>,
    pub intake: Arc<InstrumentedStorage>,
    pub ticket_media: Arc<InstrumentedStorage>,
    pub ticket_audio: Arc<InstrumentedStorage>,
    pub resolver: Arc<StaticUriResolver>,
    pub owner_id: Uuid,
    pub storage_root: PathBuf,
    pub captures_dir: PathBuf,
    pub _temp_dir: TempDir,
}

pub async fn setup_test_engine() -> TestEngine {
    setup_test_engine_with(fast_config()).await
}

pub async fn setup_test_engine_with(mut config: SyncConfig) -> TestEngine {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage_root = temp_dir.path().join("storage");
    let captures_dir = temp_dir.path().join("captures");
    tokio::fs::create_dir_all(&captures_dir).await.unwrap();
    config.temp_dir = Some(temp_dir.path().join("staging"));

    let bucket = |name: &'static str| {
        let root = storage_root.clone();
        async move {
            let local = LocalStorage::new(root, BASE_URL.to_string(), name)
                .await
                .expect("Failed to create local bucket");
            InstrumentedStorage::new(Arc::new(local))
        }
    };
    let intake = bucket("intake").await;
    let ticket_media = bucket("ticket-media").await;
    let ticket_audio = bucket("ticket-audio").await;

    let items = Arc::new(FaultyItems::default());
    let attachments = Arc::new(FaultyAttachments::default());
    let resolver = Arc::new(StaticUriResolver::new());

    let deps = EngineDeps {
        items: items.clone(),
        attachments: attachments.clone(),
        buckets: Buckets::new(intake.clone(), ticket_media.clone(), ticket_audio.clone()),
        resolver: resolver.clone(),
    };

    TestEngine {
        service: MediaSyncService::new(deps, config),
        items,
        attachments,
        intake,
        ticket_media,
        ticket_audio,
        resolver,
        owner_id: Uuid::new_v4(),
        storage_root,
        captures_dir,
        _temp_dir: temp_dir,
    }
}

impl TestEngine {
    /// Write a capture file and return its path.
    pub async fn write_capture(&self, file_name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.captures_dir.join(file_name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    /// Capture a file that exists on disk.
    pub async fn capture(&self, media_type: MediaType, file_name: &str) -> MediaItem {
        let path = self
            .write_capture(file_name, format!("bytes of {}", file_name).as_bytes())
            .await;
        self.capture_from(media_type, file_name, path.to_string_lossy().to_string())
            .await
    }

    /// Capture with an arbitrary byte source (path or platform handle).
    pub async fn capture_from(
        &self,
        media_type: MediaType,
        file_name: &str,
        local_path: String,
    ) -> MediaItem {
        self.service
            .capture(NewMediaItem {
                owner_id: self.owner_id,
                media_type,
                file_name: file_name.to_string(),
                local_path,
                file_size_bytes: 64,
                duration_seconds: None,
                width: None,
                height: None,
                metadata: BTreeMap::new(),
            })
            .await
            .expect("capture failed")
    }

    /// Filesystem location of an object in a bucket.
    pub fn object_path(&self, storage: &InstrumentedStorage, key: &str) -> PathBuf {
        self.storage_root.join(storage.bucket()).join(key)
    }

    pub fn object_exists(&self, storage: &InstrumentedStorage, key: &str) -> bool {
        self.object_path(storage, key).exists()
    }

    pub fn staging_is_empty(&self) -> bool {
        let staging = self._temp_dir.path().join("staging");
        match std::fs::read_dir(&staging) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    /// Storage calls across every bucket.
    pub fn storage_calls(&self) -> u32 {
        self.intake.calls() + self.ticket_media.calls() + self.ticket_audio.calls()
    }
}
