use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record linking a stored object to a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Attachment {
    pub id: Uuid,
    pub ticket_id: String,
    pub storage_path: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub category: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub processed: bool,
    pub source: String,
}

/// Attachment record to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub ticket_id: String,
    pub storage_path: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub category: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub source: String,
}

impl NewAttachment {
    pub fn into_attachment(self, id: Uuid) -> Attachment {
        Attachment {
            id,
            ticket_id: self.ticket_id,
            storage_path: self.storage_path,
            original_name: self.original_name,
            file_size: self.file_size,
            mime_type: self.mime_type,
            category: self.category,
            uploaded_by: self.uploaded_by,
            uploaded_at: self.uploaded_at,
            processed: false,
            source: self.source,
        }
    }
}
