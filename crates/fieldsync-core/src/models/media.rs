use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::sync_status::SyncStatus;
use crate::constants::{FALLBACK_MIME_TYPE, METADATA_MIME_TYPE, METADATA_ORIGINAL_NAME};

/// Media type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn category(self) -> MediaCategory {
        match self {
            MediaType::Image => MediaCategory::Photo,
            MediaType::Video => MediaCategory::Video,
            MediaType::Audio => MediaCategory::Audio,
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" | "photo" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            _ => Err(anyhow::anyhow!(
                "Invalid media type {}. Must be: image, video or audio",
                s
            )),
        }
    }
}

/// Category tag written on attachment records; also selects the ticket bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Photo,
    Video,
    Audio,
}

impl MediaCategory {
    pub fn tag(self) -> &'static str {
        match self {
            MediaCategory::Photo => "photo",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
        }
    }

    pub fn is_audio(self) -> bool {
        self == MediaCategory::Audio
    }
}

/// Link between an item and a ticket. The three values are only ever set together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLinkage {
    pub ticket_id: String,
    pub attachment_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

/// A captured photo, video or audio asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub media_type: MediaType,
    pub file_name: String,
    /// Device-local byte source: a filesystem path or an opaque platform handle.
    pub local_path: Option<String>,
    /// Resolvable URL once the intake copy is durable.
    pub remote_locator: Option<String>,
    /// Object key of the intake copy.
    pub storage_path: Option<String>,
    pub file_size_bytes: i64,
    pub duration_seconds: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub metadata: BTreeMap<String, String>,
    pub sync_status: SyncStatus,
    pub linkage: Option<TicketLinkage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// Build a fresh `pending`, local-only item from capture input.
    pub fn from_capture(new: NewMediaItem) -> Self {
        let now = Utc::now();
        let mut metadata = new.metadata;
        metadata
            .entry(METADATA_MIME_TYPE.to_string())
            .or_insert_with(|| mime_for_file_name(&new.file_name).to_string());
        metadata
            .entry(METADATA_ORIGINAL_NAME.to_string())
            .or_insert_with(|| new.file_name.clone());

        // Only dimensions/duration that make sense for the type are kept
        let (width, height) = match new.media_type {
            MediaType::Audio => (None, None),
            _ => (new.width, new.height),
        };
        let duration_seconds = match new.media_type {
            MediaType::Image => None,
            _ => new.duration_seconds,
        };

        Self {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            media_type: new.media_type,
            file_name: new.file_name,
            local_path: Some(new.local_path),
            remote_locator: None,
            storage_path: None,
            file_size_bytes: new.file_size_bytes,
            duration_seconds,
            width,
            height,
            metadata,
            sync_status: SyncStatus::Pending,
            linkage: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ticket_id(&self) -> Option<&str> {
        self.linkage.as_ref().map(|l| l.ticket_id.as_str())
    }

    pub fn attachment_id(&self) -> Option<Uuid> {
        self.linkage.as_ref().map(|l| l.attachment_id)
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.linkage.as_ref().map(|l| l.assigned_at)
    }

    pub fn is_assigned(&self) -> bool {
        self.linkage.is_some()
    }

    /// A durable copy exists in the generic intake bucket.
    pub fn has_intake_copy(&self) -> bool {
        self.sync_status == SyncStatus::Synced && self.storage_path.is_some()
    }

    /// Bytes are reachable somewhere: locally or remotely.
    pub fn has_bytes(&self) -> bool {
        self.local_path.is_some() || self.remote_locator.is_some()
    }

    pub fn mime_type(&self) -> &str {
        self.metadata
            .get(METADATA_MIME_TYPE)
            .map(String::as_str)
            .unwrap_or_else(|| mime_for_file_name(&self.file_name))
    }

    pub fn original_name(&self) -> &str {
        self.metadata
            .get(METADATA_ORIGINAL_NAME)
            .map(String::as_str)
            .unwrap_or(&self.file_name)
    }
}

/// Input for registering a freshly captured asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaItem {
    pub owner_id: Uuid,
    pub media_type: MediaType,
    pub file_name: String,
    pub local_path: String,
    pub file_size_bytes: i64,
    pub duration_seconds: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Best-effort mime type from the file extension.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return FALLBACK_MIME_TYPE,
    };
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "caf" => "audio/x-caf",
        _ => FALLBACK_MIME_TYPE,
    }
}
