//! Domain types for document ingestion.
//!
//! This module contains the core data structures:
//! - TypeCategory: What a file turned out to be
//! - ContentDigest: SHA-256 fingerprint of file bytes
//! - QueueItem: A staged upload awaiting ingestion
//! - FileRecord: A stored document

pub mod category;
pub mod digest;
pub mod queue_item;
pub mod record;

// Re-export commonly used types
pub use category::TypeCategory;
pub use digest::ContentDigest;
pub use queue_item::{strip_extension, QueueItem};
pub use record::{FileRecord, NewFileRecord};
