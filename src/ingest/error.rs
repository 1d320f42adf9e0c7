//! Ingestion errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Pipeline step an error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stage,
    Hash,
    Classify,
    Normalize,
    Move,
    Persist,
    Cleanup,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Stage => "stage",
            Step::Hash => "hash",
            Step::Classify => "classify",
            Step::Normalize => "normalize",
            Step::Move => "move",
            Step::Persist => "persist",
            Step::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while ingesting a single item
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error during {step} of {path}: {source}")]
    Io {
        step: Step,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot convert image {path}: {message}")]
    Conversion { path: PathBuf, message: String },

    #[error("Cannot store file of type {0}")]
    NotStorable(crate::domain::TypeCategory),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Ingestion queue is closed")]
    QueueClosed,

    #[error("Ingestion worker failed: {0}")]
    Worker(String),
}

impl IngestError {
    pub(crate) fn io(step: Step, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            step,
            path: path.into(),
            source,
        }
    }

    /// The step this error belongs to, where it has one
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Io { step, .. } => Some(*step),
            Self::Conversion { .. } => Some(Step::Normalize),
            Self::NotStorable(_) => Some(Step::Move),
            Self::Store(_) => Some(Step::Persist),
            Self::QueueClosed | Self::Worker(_) => None,
        }
    }
}
