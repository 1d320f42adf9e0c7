//! Moves accepted files into content-addressed storage.
//!
//! # Layout
//!
//! ```text
//! <files_dir>/
//! ├── Pdf/<sha256>.pdf
//! ├── Image/<sha256>.png
//! └── Plaintext/<sha256>.txt
//! ```

use std::path::{Path, PathBuf};

use super::error::{IngestError, Step};
use crate::domain::{ContentDigest, TypeCategory};

/// Relocates staged files to their final path
#[derive(Debug, Clone)]
pub struct StorageMover {
    files_dir: PathBuf,
}

impl StorageMover {
    pub fn new(files_dir: impl Into<PathBuf>) -> Self {
        Self {
            files_dir: files_dir.into(),
        }
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Final path for content of `category` with `digest`.
    ///
    /// Depends on nothing but its arguments.
    pub fn final_path(
        &self,
        category: TypeCategory,
        digest: &ContentDigest,
    ) -> Result<PathBuf, IngestError> {
        let extension = category
            .extension()
            .ok_or(IngestError::NotStorable(category))?;
        Ok(self
            .files_dir
            .join(category.as_str())
            .join(format!("{}{}", digest, extension)))
    }

    /// Move `source` to its content-addressed path, replacing whatever is
    /// there. Returns the final path.
    pub fn move_to_store(
        &self,
        source: &Path,
        category: TypeCategory,
        digest: &ContentDigest,
    ) -> Result<PathBuf, IngestError> {
        let target = self.final_path(category, digest)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::io(Step::Move, parent, e))?;
        }

        match std::fs::rename(source, &target) {
            Ok(()) => {}
            Err(e) if is_cross_device(&e) => {
                tracing::debug!(
                    source = %source.display(),
                    "Rename crosses filesystems, copying instead"
                );
                copy_then_remove(source, &target)?;
            }
            Err(e) => return Err(IngestError::io(Step::Move, source, e)),
        }

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            "Moved file into store"
        );

        Ok(target)
    }
}

fn copy_then_remove(source: &Path, target: &Path) -> Result<(), IngestError> {
    // Copy under a sibling name first so the target is never half-written
    let partial = target.with_extension("partial");
    std::fs::copy(source, &partial).map_err(|e| IngestError::io(Step::Move, target, e))?;
    if let Err(e) = std::fs::rename(&partial, target) {
        let _ = std::fs::remove_file(&partial);
        return Err(IngestError::io(Step::Move, target, e));
    }
    std::fs::remove_file(source).map_err(|e| IngestError::io(Step::Move, source, e))
}

fn is_cross_device(err: &std::io::Error) -> bool {
    // EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows
    #[cfg(unix)]
    const CROSS_DEVICE: i32 = 18;
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17;
    #[cfg(not(any(unix, windows)))]
    const CROSS_DEVICE: i32 = -1;

    err.raw_os_error() == Some(CROSS_DEVICE)
}
