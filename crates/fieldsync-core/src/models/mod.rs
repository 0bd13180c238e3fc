//! Domain models

pub mod assignment;
pub mod attachment;
pub mod media;
pub mod sync_status;

pub use assignment::{AssignedItem, AssignmentResult, FailedItem};
pub use attachment::{Attachment, NewAttachment};
pub use media::{mime_for_file_name, MediaCategory, MediaItem, MediaType, NewMediaItem, TicketLinkage};
pub use sync_status::SyncStatus;
