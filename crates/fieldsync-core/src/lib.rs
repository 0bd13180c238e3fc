//! Fieldsync Core Library
//!
//! Domain models, error types, configuration and constants shared by the
//! storage, database and service crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, StorageBackend, StorageConfig, SyncConfig};
pub use error::{AppError, ErrorKind, LogLevel, SyncError};
