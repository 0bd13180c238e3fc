//! Fieldsync Storage Library
//!
//! Object storage abstraction and backends (S3 via `object_store`, local
//! filesystem), deterministic key generation, the bucket set used by the
//! engine, and the platform URI resolver capability.
//!
//! # Buckets and keys
//!
//! - **Generic intake bucket**: `{owner_id}/{item_id}`
//! - **Ticket buckets** (one for image/video, one for audio):
//!   `{ticket_id}/{item_id}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod resolver;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_buckets, Buckets};
pub use fieldsync_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use resolver::{is_platform_handle, local_file_path, ResolveError, StaticUriResolver, UriResolver};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteReader, Storage, StorageError, StorageResult};
