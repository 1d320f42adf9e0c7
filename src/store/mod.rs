//! Metadata persistence.
//!
//! A single embedded SQLite file holds one `File` row per stored document plus
//! per-type companion tables:
//!
//! ```text
//! File ──┬── DocumentPdf        (fileID → File.id)
//!        ├── DocumentImage
//!        └── DocumentPlaintext
//! ```

pub mod metadata;
pub mod schema;

pub use metadata::{MetadataStore, StoreError};
