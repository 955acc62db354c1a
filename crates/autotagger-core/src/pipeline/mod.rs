//! Image pipeline components.
//!
//! - **decode**: Load and decode images with size limits
//! - **hash**: Content hashes used as cache keys
//! - **discovery**: Resolve path/glob specs into image records
//! - **channel**: Bounded batch stream for large-batch mode
//! - **sidecar**: Tags files and dry-run logs

pub mod channel;
pub mod decode;
pub mod discovery;
pub mod hash;
pub mod sidecar;

// Re-exports for convenient access
pub use channel::{stream_batches, Batch};
pub use decode::ImageDecoder;
pub use discovery::{ImageRecord, IoResolver};
pub use hash::Hasher;
