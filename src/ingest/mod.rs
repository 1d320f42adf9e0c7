//! Document ingestion pipeline.
//!
//! Uploaded files are staged in a temp directory, queued, and processed one
//! at a time by a single worker:
//!
//! 1. **Hasher**: SHA-256 of the staged bytes
//! 2. **Store lookup**: drop the upload if the digest is already known
//! 3. **Classifier**: magic bytes and a text heuristic decide the category
//! 4. **Normalizer**: images are re-encoded to PNG and rehashed
//! 5. **Mover**: the file lands at its content-addressed path
//! 6. **Store insert**: the record is written
//!
//! # Architecture
//!
//! ```text
//! stage_file → IngestQueue ──mpsc──→ worker → Pipeline::process
//!                                                 ↓
//!                                   files/<Type>/<sha256>.<ext>
//!                                   documents.amo
//! ```

pub mod classifier;
pub mod error;
pub mod hasher;
pub mod mover;
pub mod normalizer;
pub mod pipeline;
pub mod queue;
pub mod staging;

pub use classifier::{Classifier, ClassifierSettings, ImageKind};
pub use error::{IngestError, Step};
pub use hasher::{hash_bytes, hash_file};
pub use mover::StorageMover;
pub use normalizer::ImageNormalizer;
pub use pipeline::{Outcome, Pipeline};
pub use queue::{IngestQueue, ItemReport, QueueStats};
pub use staging::stage_file;
