//! Persisted file records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::TypeCategory;
use super::digest::ContentDigest;

/// A stored document as recorded in the `File` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Row id assigned by the store
    pub id: i64,

    /// Digest of the bytes as uploaded
    pub original_checksum: ContentDigest,

    /// Digest of the stored bytes (differs from the original for images)
    pub converted_checksum: ContentDigest,

    /// Final content-addressed location
    pub file_path: PathBuf,

    pub file_type: TypeCategory,

    pub created_on: DateTime<Utc>,

    /// Display name
    pub name: String,

    /// Filename supplied by the client
    pub old_file_name: String,
}

/// A record ready for insertion; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub original_checksum: ContentDigest,
    pub converted_checksum: ContentDigest,
    pub file_path: PathBuf,
    pub file_type: TypeCategory,
    pub created_on: DateTime<Utc>,
    pub name: String,
    pub old_file_name: String,
}

impl NewFileRecord {
    /// Attach the assigned id
    pub fn into_record(self, id: i64) -> FileRecord {
        FileRecord {
            id,
            original_checksum: self.original_checksum,
            converted_checksum: self.converted_checksum,
            file_path: self.file_path,
            file_type: self.file_type,
            created_on: self.created_on,
            name: self.name,
            old_file_name: self.old_file_name,
        }
    }
}
