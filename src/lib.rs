//! docstash - content-addressed document store
//!
//! Uploaded files are deduplicated by SHA-256, classified by their leading
//! bytes, normalized (images become PNG), and moved to a path derived from
//! their digest. Every stored file gets a row in an SQLite index.
//!
//! # Architecture
//!
//! A single worker drains the ingestion queue, so items are processed one at
//! a time and in the order they arrived:
//! - Duplicate uploads are dropped before any other work
//! - Unusable (binary, unrecognized) content is discarded
//! - A failing item is cleaned up and never stops the worker
//!
//! # Modules
//!
//! - `config`: Path and classifier configuration
//! - `domain`: Data structures (QueueItem, FileRecord, TypeCategory)
//! - `ingest`: Hasher, classifier, normalizer, mover, pipeline and queue
//! - `store`: SQLite metadata store
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Ingest some files
//! docstash ingest notes.txt scan.pdf photo.jpg
//!
//! # List what is stored
//! docstash list --type image
//!
//! # Look a document up by checksum
//! docstash show <sha256>
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::{ResolvedConfig, StorageLayout};
pub use domain::{ContentDigest, FileRecord, NewFileRecord, QueueItem, TypeCategory};
pub use ingest::{IngestError, IngestQueue, ItemReport, Outcome, Pipeline, QueueStats};
pub use store::{MetadataStore, StoreError};
