//! Default values for engine tunables and fixed vocabulary.

/// Total upload attempts before an item settles in `failed`.
pub const DEFAULT_UPLOAD_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff unit: attempt `n` waits `(n - 1) * base` before starting.
pub const DEFAULT_UPLOAD_BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound on waiting for an in-flight intake sync during assignment.
pub const DEFAULT_SYNC_WAIT_TIMEOUT_SECS: u64 = 60;

/// Cap on transfers running at the same time across items.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 4;

/// Delay before a search query change is applied to the filter.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

pub const DEFAULT_INTAKE_BUCKET: &str = "media-intake";
pub const DEFAULT_TICKET_MEDIA_BUCKET: &str = "ticket-media";
pub const DEFAULT_TICKET_AUDIO_BUCKET: &str = "ticket-audio";

/// `source` column value for attachments created from field captures.
pub const ATTACHMENT_SOURCE_FIELD_CAPTURE: &str = "field_capture";

/// Metadata keys the free-text search looks at besides the file name.
pub const SEARCHABLE_METADATA_KEYS: &[&str] = &["description", "original_name", "mime_type"];

pub const METADATA_MIME_TYPE: &str = "mime_type";
pub const METADATA_ORIGINAL_NAME: &str = "original_name";
pub const METADATA_DESCRIPTION: &str = "description";

pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
