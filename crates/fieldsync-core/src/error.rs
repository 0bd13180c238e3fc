//! Error types module
//!
//! `AppError` is returned by the relational backend layer. `SyncError` is the
//! engine taxonomy: every failure of an upload, assignment or deletion is
//! expressed as one of its variants and classified with [`ErrorKind`].
//!
//! The `Database` variant carries a `sqlx::Error` when the `sqlx` feature is on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SyncStatus;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like precondition failures
    Debug,
    /// Recoverable issues the caller may retry
    Warn,
    /// Unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", err))
    }
}

/// Classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Precondition violation; rejects a whole call before any I/O.
    Validation,
    /// An opaque platform handle could not be turned into a path.
    Resolution,
    /// Moving bytes to or from object storage failed.
    Transfer,
    /// A relational backend write failed.
    Persistence,
    /// A best-effort rollback failed. Logged only.
    Compensation,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{conflicting} item(s) already assigned to a ticket")]
    AlreadyAssigned { conflicting: usize },

    #[error("Media item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Could not resolve media handle {handle}: {reason}")]
    Resolution { handle: String, reason: String },

    #[error("Transfer failed after {attempts} attempt(s): {message}")]
    Transfer { attempts: u32, message: String },

    #[error("Timed out waiting for in-flight sync of {0}")]
    SyncTimeout(Uuid),

    #[error("Item {0} has no local file and no remote copy")]
    NoSource(Uuid),

    #[error("Local file error: {0}")]
    LocalFile(#[from] std::io::Error),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] AppError),

    #[error("Compensation failed for {key}: {message}")]
    Compensation { key: String, message: String },

    #[error("Invalid sync transition {from} -> {to}")]
    InvalidTransition { from: SyncStatus, to: SyncStatus },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::AlreadyAssigned { .. }
            | SyncError::ItemNotFound(_)
            | SyncError::InvalidRequest(_)
            | SyncError::InvalidTransition { .. } => ErrorKind::Validation,
            SyncError::Resolution { .. } => ErrorKind::Resolution,
            SyncError::Transfer { .. }
            | SyncError::SyncTimeout(_)
            | SyncError::NoSource(_)
            | SyncError::LocalFile(_) => ErrorKind::Transfer,
            SyncError::Persistence(_) => ErrorKind::Persistence,
            SyncError::Compensation { .. } => ErrorKind::Compensation,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            SyncError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            SyncError::InvalidRequest(_) => "INVALID_REQUEST",
            SyncError::Resolution { .. } => "RESOLUTION_FAILED",
            SyncError::Transfer { .. } => "TRANSFER_FAILED",
            SyncError::SyncTimeout(_) => "SYNC_TIMEOUT",
            SyncError::NoSource(_) => "NO_SOURCE",
            SyncError::LocalFile(_) => "LOCAL_FILE_ERROR",
            SyncError::Persistence(_) => "PERSISTENCE_FAILED",
            SyncError::Compensation { .. } => "COMPENSATION_FAILED",
            SyncError::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Whether offering the user a retry makes sense.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transfer | ErrorKind::Persistence | ErrorKind::Resolution
        ) && !matches!(self, SyncError::NoSource(_))
    }

    pub fn log_level(&self) -> LogLevel {
        match self.kind() {
            ErrorKind::Validation => LogLevel::Debug,
            ErrorKind::Resolution | ErrorKind::Transfer | ErrorKind::Compensation => {
                LogLevel::Warn
            }
            ErrorKind::Persistence => LogLevel::Error,
        }
    }
}
