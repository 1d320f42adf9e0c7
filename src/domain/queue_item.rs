//! Pending units of ingestion work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A staged upload waiting to be ingested.
///
/// The staging file belongs to the queue from enqueue until the item is
/// processed: it is either moved into the store or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Where the uploaded bytes were written
    pub staging_path: PathBuf,

    /// Filename supplied by the client
    pub original_name: String,

    /// Generated name of the staging file
    pub temp_name: String,

    /// Display name requested by the client, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_name: Option<String>,
}

impl QueueItem {
    /// Create a queue item without a desired display name
    pub fn new(
        staging_path: impl Into<PathBuf>,
        original_name: impl Into<String>,
        temp_name: impl Into<String>,
    ) -> Self {
        Self {
            staging_path: staging_path.into(),
            original_name: original_name.into(),
            temp_name: temp_name.into(),
            desired_name: None,
        }
    }

    /// Set the desired display name
    pub fn with_desired_name(mut self, name: impl Into<String>) -> Self {
        self.desired_name = Some(name.into());
        self
    }

    /// Staging path, or `None` if the item carries no usable path
    pub fn staging_path(&self) -> Option<&Path> {
        if self.staging_path.as_os_str().is_empty() || !self.staging_path.exists() {
            None
        } else {
            Some(&self.staging_path)
        }
    }

    /// Display name for the stored record.
    ///
    /// The desired name wins when it is non-blank; otherwise the original
    /// filename with its last extension removed.
    pub fn display_name(&self) -> String {
        match self.desired_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => strip_extension(&self.original_name).to_string(),
        }
    }
}

/// Remove the final `.ext` suffix from a filename.
///
/// A leading dot is not an extension separator (`.bashrc` stays as is) and a
/// trailing dot has no extension to remove.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => &name[..idx],
        _ => name,
    }
}
