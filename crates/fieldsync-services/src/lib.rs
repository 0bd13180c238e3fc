//! Fieldsync Services
//!
//! The media synchronization and ticket-assignment engine: the in-memory item
//! store, the retrying upload pipeline, the assignment coordinator, deletion,
//! and the query/filter layer. [`MediaSyncService`] is the entry point.

pub mod assignment;
pub mod context;
pub mod events;
pub mod lifecycle;
pub mod query;
pub mod retry;
pub mod service;
pub mod store;
pub mod upload;

pub use assignment::AssignmentCoordinator;
pub use context::{EngineContext, EngineDeps};
pub use events::{EventBus, SyncEvent};
pub use lifecycle::MediaLifecycleService;
pub use query::{FilterState, MediaFilter, TicketFilter};
pub use service::MediaSyncService;
pub use store::MediaStore;
pub use upload::UploadEngine;
