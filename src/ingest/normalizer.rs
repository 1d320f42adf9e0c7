//! Image normalization to PNG.
//!
//! Every image is decoded and re-encoded, including ones that already are
//! PNG, so that all stored images come out of the same encoder.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ImageError, ImageFormat, ImageReader};
use tempfile::NamedTempFile;

use super::error::{IngestError, Step};

/// Re-encodes images into the converted staging directory
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    output_dir: PathBuf,
}

impl ImageNormalizer {
    /// Create a normalizer writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the normalized copy of `source` will be written.
    ///
    /// The `.normalized.png` suffix keeps the target distinct from the source
    /// even when the source already sits in the output dir.
    pub fn target_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted".to_string());
        self.output_dir.join(format!("{}.normalized.png", stem))
    }

    /// Decode `source` and write it as PNG. Returns the new path.
    ///
    /// The source file is left in place.
    pub fn normalize(&self, source: &Path) -> Result<PathBuf, IngestError> {
        let target = self.target_for(source);

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| IngestError::io(Step::Normalize, &self.output_dir, e))?;

        let image = ImageReader::open(source)
            .map_err(|e| IngestError::io(Step::Normalize, source, e))?
            .with_guessed_format()
            .map_err(|e| IngestError::io(Step::Normalize, source, e))?
            .decode()
            .map_err(|e| IngestError::Conversion {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        // Encode next to the target and rename, so a half-written PNG never
        // appears under the final name
        let mut tmp = NamedTempFile::new_in(&self.output_dir)
            .map_err(|e| IngestError::io(Step::Normalize, &self.output_dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            image
                .write_to(&mut writer, ImageFormat::Png)
                .map_err(|e| encode_error(&target, e))?;
            writer
                .flush()
                .map_err(|e| IngestError::io(Step::Normalize, &target, e))?;
        }
        tmp.persist(&target)
            .map_err(|e| IngestError::io(Step::Normalize, &target, e.error))?;

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            width = image.width(),
            height = image.height(),
            "Normalized image to PNG"
        );

        Ok(target)
    }
}

fn encode_error(path: &Path, err: ImageError) -> IngestError {
    match err {
        ImageError::IoError(e) => IngestError::io(Step::Normalize, path, e),
        other => IngestError::Conversion {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}
