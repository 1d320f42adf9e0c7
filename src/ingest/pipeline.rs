//! Per-item ingestion pipeline.
//!
//! hash → dedup check → classify → [normalize → rehash] → move → persist
//!
//! Every staged file ends up either in the store or deleted, whatever the
//! outcome of the item.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::classifier::{Classifier, ClassifierSettings};
use super::error::{IngestError, Step};
use super::hasher::hash_file;
use super::mover::StorageMover;
use super::normalizer::ImageNormalizer;
use crate::config::StorageLayout;
use crate::domain::{ContentDigest, FileRecord, NewFileRecord, QueueItem, TypeCategory};
use crate::store::MetadataStore;

/// Terminal result of processing one item
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Stored and recorded
    Stored(FileRecord),

    /// Bytes already known under this original digest; staging file removed
    Duplicate(ContentDigest),

    /// Content classified as unusable; staging file removed
    Unusable,

    /// The item had no staging file to work on
    Skipped,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Stored(_) => "stored",
            Outcome::Duplicate(_) => "duplicate",
            Outcome::Unusable => "unusable",
            Outcome::Skipped => "skipped",
        }
    }
}

/// The services one item passes through
pub struct Pipeline {
    store: MetadataStore,
    classifier: Classifier,
    normalizer: ImageNormalizer,
    mover: StorageMover,
}

impl Pipeline {
    pub fn new(
        store: MetadataStore,
        classifier: Classifier,
        normalizer: ImageNormalizer,
        mover: StorageMover,
    ) -> Self {
        Self {
            store,
            classifier,
            normalizer,
            mover,
        }
    }

    /// Wire the services for a storage layout
    pub fn for_layout(
        layout: &StorageLayout,
        settings: ClassifierSettings,
        store: MetadataStore,
    ) -> Self {
        Self::new(
            store,
            Classifier::new(settings),
            ImageNormalizer::new(&layout.converted_dir),
            StorageMover::new(&layout.files_dir),
        )
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Run one item to its terminal outcome.
    ///
    /// On error, whatever the item left in staging is deleted before
    /// returning.
    pub fn process(&mut self, item: &QueueItem) -> Result<Outcome, IngestError> {
        let Some(staging) = item.staging_path() else {
            tracing::warn!(
                file = %item.original_name,
                path = %item.staging_path.display(),
                "Staging file missing, skipping"
            );
            return Ok(Outcome::Skipped);
        };

        let mut leftovers = Leftovers::staged(staging);
        let result = self.run(item, &mut leftovers);

        if result.is_err() {
            self.discard(&mut leftovers);
        }

        result
    }

    fn run(&mut self, item: &QueueItem, leftovers: &mut Leftovers) -> Result<Outcome, IngestError> {
        let staging = item.staging_path.as_path();

        let original = hash_file(staging).map_err(|e| IngestError::io(Step::Hash, staging, e))?;

        if self.store.duplicate_exists(&original)? {
            tracing::info!(
                file = %item.original_name,
                checksum = %original,
                "Duplicate upload, discarding"
            );
            remove_quietly(staging);
            leftovers.staging = None;
            return Ok(Outcome::Duplicate(original));
        }

        let category = self
            .classifier
            .classify(staging)
            .map_err(|e| IngestError::io(Step::Classify, staging, e))?;

        if category == TypeCategory::Unusable {
            tracing::info!(file = %item.original_name, "Unusable content, discarding");
            remove_quietly(staging);
            leftovers.staging = None;
            return Ok(Outcome::Unusable);
        }

        let (current, converted) = if category == TypeCategory::Image {
            let normalized = self.normalizer.normalize(staging)?;
            leftovers.converted = Some(normalized.clone());

            remove_quietly(staging);
            leftovers.staging = None;

            let digest = hash_file(&normalized)
                .map_err(|e| IngestError::io(Step::Hash, &normalized, e))?;
            (normalized, digest)
        } else {
            (staging.to_path_buf(), original.clone())
        };

        let final_path = self.mover.move_to_store(&current, category, &converted)?;
        leftovers.staging = None;
        leftovers.converted = None;
        leftovers.stored = Some(final_path.clone());
        let bytes = file_size(&final_path);

        let record = self.store.insert(NewFileRecord {
            original_checksum: original,
            converted_checksum: converted,
            file_path: final_path,
            file_type: category,
            created_on: Utc::now(),
            name: item.display_name(),
            old_file_name: item.original_name.clone(),
        })?;
        leftovers.stored = None;

        tracing::info!(
            file = %item.original_name,
            id = record.id,
            file_type = %record.file_type,
            bytes,
            path = %record.file_path.display(),
            "Stored document"
        );

        Ok(Outcome::Stored(record))
    }

    /// Best-effort removal of a stored file a failed item left behind.
    ///
    /// Staging and converted files go when `leftovers` is dropped.
    fn discard(&self, leftovers: &mut Leftovers) {
        // A stored file may already back another record with the same digest
        if let Some(stored) = leftovers.stored.take() {
            match self.store.path_in_use(&stored) {
                Ok(false) => remove_quietly(&stored),
                Ok(true) => {}
                Err(e) => tracing::warn!(
                    path = %stored.display(),
                    "Cannot tell whether stored file is referenced, keeping it: {}",
                    e
                ),
            }
        }
    }
}

/// Files an in-flight item still owns.
///
/// Dropping it removes the staging and converted files it still holds, so
/// they are cleaned up even when processing panics.
#[derive(Debug)]
struct Leftovers {
    staging: Option<PathBuf>,
    converted: Option<PathBuf>,
    stored: Option<PathBuf>,
}

impl Leftovers {
    fn staged(path: &Path) -> Self {
        Self {
            staging: Some(path.to_path_buf()),
            converted: None,
            stored: None,
        }
    }
}

impl Drop for Leftovers {
    fn drop(&mut self) {
        for path in [self.staging.take(), self.converted.take()].into_iter().flatten() {
            remove_quietly(&path);
        }
    }
}

/// Size of a stored file, 0 if it cannot be read
fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            step = %Step::Cleanup,
            path = %path.display(),
            "Failed to remove file: {}",
            e
        ),
    }
}
