use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::SyncError;

/// Durability of an item's copy in the generic intake bucket.
///
/// ```text
/// pending ──► syncing ──► synced
///                │  ▲
///                ▼  │
///               failed
/// ```
///
/// `synced` is terminal. `failed` is terminal until an upload is re-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "sync_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn can_transition_to(self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (SyncStatus::Pending, SyncStatus::Syncing)
                | (SyncStatus::Syncing, SyncStatus::Synced)
                | (SyncStatus::Syncing, SyncStatus::Failed)
                | (SyncStatus::Failed, SyncStatus::Syncing)
        )
    }

    /// Validate a transition, returning the new state.
    pub fn transition_to(self, next: SyncStatus) -> Result<SyncStatus, SyncError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SyncError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_in_flight(self) -> bool {
        self == SyncStatus::Syncing
    }

    /// Whether an upload may be started from this state.
    pub fn can_start_upload(self) -> bool {
        self.can_transition_to(SyncStatus::Syncing)
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "syncing" => Ok(SyncStatus::Syncing),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(anyhow::anyhow!(
                "Invalid sync status {}. Must be: pending, syncing, synced or failed",
                s
            )),
        }
    }
}
