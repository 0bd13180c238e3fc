//! Deterministic object keys.
//!
//! Intake: `{owner_id}/{item_id}`. Ticket buckets: `{ticket_id}/{item_id}.{ext}`.
//! Re-uploading the same item always targets the same key, so a retry
//! overwrites rather than duplicates.

use uuid::Uuid;

/// Key of an item's copy in the generic intake bucket.
pub fn intake_key(owner_id: Uuid, item_id: Uuid) -> String {
    format!("{}/{}", owner_id, item_id)
}

/// Key of an item's copy in a ticket-scoped bucket.
pub fn ticket_key(ticket_id: &str, item_id: Uuid, file_name: &str) -> String {
    let ticket = sanitize_segment(ticket_id);
    match extension(file_name) {
        Some(ext) => format!("{}/{}.{}", ticket, item_id, ext),
        None => format!("{}/{}", ticket, item_id),
    }
}

/// Reject keys that could escape a bucket root.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
