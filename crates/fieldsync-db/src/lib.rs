//! Fieldsync Database Layer
//!
//! The relational backend seam used by the sync engine: repository traits for
//! media items and attachment records, Postgres implementations, and
//! in-memory implementations for offline use and tests.

pub mod db;
pub mod repository;

pub use repository::{AttachmentRepository, MediaItemRepository, SyncStateUpdate};

#[cfg(feature = "postgres")]
pub use db::postgres::{PgAttachmentRepository, PgMediaItemRepository, MIGRATOR};

#[cfg(feature = "memory")]
pub use db::memory::{InMemoryAttachmentRepository, InMemoryMediaItemRepository};
