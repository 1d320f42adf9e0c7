//! Local stand-in for the upload handler: copies a file into the temp dir
//! under a generated name and describes it as a queue item.

use std::path::Path;

use uuid::Uuid;

use super::error::{IngestError, Step};
use crate::domain::QueueItem;

/// Copy `source` into `temp_dir` as `<uuid v4><.ext>` and build its item.
///
/// The source is left untouched; the queue owns the copy.
pub fn stage_file(source: &Path, temp_dir: &Path) -> Result<QueueItem, IngestError> {
    let original_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            IngestError::io(
                Step::Stage,
                source,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

    let extension = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let temp_name = format!("{}{}", Uuid::new_v4(), extension);

    std::fs::create_dir_all(temp_dir).map_err(|e| IngestError::io(Step::Stage, temp_dir, e))?;

    let staging_path = temp_dir.join(&temp_name);
    std::fs::copy(source, &staging_path).map_err(|e| IngestError::io(Step::Stage, source, e))?;

    tracing::debug!(
        file = %original_name,
        temp = %temp_name,
        "Staged upload"
    );

    Ok(QueueItem::new(staging_path, original_name, temp_name))
}
