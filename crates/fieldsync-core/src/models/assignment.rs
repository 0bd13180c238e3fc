use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Aggregate outcome of one `assign` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub ticket_id: String,
    pub succeeded: Vec<AssignedItem>,
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedItem {
    pub item_id: Uuid,
    pub attachment_id: Uuid,
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub item_id: Uuid,
    pub kind: ErrorKind,
    pub error: String,
}

impl AssignmentResult {
    pub fn new(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attachment_for(&self, item_id: Uuid) -> Option<Uuid> {
        self.succeeded
            .iter()
            .find(|s| s.item_id == item_id)
            .map(|s| s.attachment_id)
    }

    pub fn failure_for(&self, item_id: Uuid) -> Option<&FailedItem> {
        self.failed.iter().find(|f| f.item_id == item_id)
    }
}
