//! Engine events.
//!
//! Background work (deferred syncs) reports its failures here instead of
//! dropping them. Publishing never blocks and never fails; lagging or absent
//! subscribers simply miss events.

use fieldsync_core::models::SyncStatus;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    StatusChanged {
        item_id: Uuid,
        status: SyncStatus,
    },
    Assigned {
        item_id: Uuid,
        ticket_id: String,
        attachment_id: Uuid,
    },
    BackgroundSyncFailed {
        item_id: Uuid,
        error: String,
    },
    Deleted {
        item_id: Uuid,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: SyncEvent) {
        tracing::debug!(?event, "Publishing sync event");
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
