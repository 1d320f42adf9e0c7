//! File type categories assigned by the classifier.

use serde::{Deserialize, Serialize};

/// Semantic category of an uploaded file, decided from its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    /// Portable Document Format
    Pdf,

    /// Raster image (stored as PNG after normalization)
    Image,

    /// Any text-like content without a recognized signature
    Plaintext,

    /// Binary content we cannot use. Never stored.
    Unusable,
}

impl TypeCategory {
    /// Categories that can end up in the store
    pub const STORABLE: [TypeCategory; 3] =
        [TypeCategory::Pdf, TypeCategory::Image, TypeCategory::Plaintext];

    /// Name used for the storage subdirectory and the `fileType` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Pdf => "Pdf",
            TypeCategory::Image => "Image",
            TypeCategory::Plaintext => "Plaintext",
            TypeCategory::Unusable => "Unusable",
        }
    }

    /// File extension of the stored file, `None` for `Unusable`
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            TypeCategory::Pdf => Some(".pdf"),
            TypeCategory::Image => Some(".png"),
            TypeCategory::Plaintext => Some(".txt"),
            TypeCategory::Unusable => None,
        }
    }

    pub fn is_storable(&self) -> bool {
        !matches!(self, TypeCategory::Unusable)
    }

    /// Companion table holding type-specific attributes
    pub fn companion_table(&self) -> Option<&'static str> {
        match self {
            TypeCategory::Pdf => Some("DocumentPdf"),
            TypeCategory::Image => Some("DocumentImage"),
            TypeCategory::Plaintext => Some("DocumentPlaintext"),
            TypeCategory::Unusable => None,
        }
    }
}

impl std::fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TypeCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(TypeCategory::Pdf),
            "image" | "img" => Ok(TypeCategory::Image),
            "plaintext" | "text" | "txt" => Ok(TypeCategory::Plaintext),
            "unusable" => Ok(TypeCategory::Unusable),
            _ => anyhow::bail!("Unknown file type: {}", s),
        }
    }
}
