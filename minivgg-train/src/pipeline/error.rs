//! Pipeline error taxonomy
//!
//! Every stage fails with exactly one variant and no stage recovers from its
//! own errors: the first error aborts the job.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline stages
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request rejected before any stage ran (e.g. unsafe taskId)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Dataset path missing, unreadable, empty, or without images
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Image could not be decoded or resized
    #[error("Preprocess error for {}: {reason}", path.display())]
    Preprocess { path: PathBuf, reason: String },

    /// Empty or malformed training partition, or fitting failure
    #[error("Training error: {0}")]
    Training(String),

    /// Predictions and ground truth disagree in length
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Model could not be written to (or read from) durable storage
    #[error("Persistence error for {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },
}

impl PipelineError {
    /// Error kind name reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "InvalidRequest",
            PipelineError::Dataset(_) => "DatasetError",
            PipelineError::Preprocess { .. } => "PreprocessError",
            PipelineError::Training(_) => "TrainingError",
            PipelineError::Evaluation(_) => "EvaluationError",
            PipelineError::Persistence { .. } => "PersistenceError",
        }
    }

    /// Stable machine-parsable code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "INVALID_REQUEST",
            PipelineError::Dataset(_) => "DATASET_ERROR",
            PipelineError::Preprocess { .. } => "PREPROCESS_ERROR",
            PipelineError::Training(_) => "TRAINING_ERROR",
            PipelineError::Evaluation(_) => "EVALUATION_ERROR",
            PipelineError::Persistence { .. } => "PERSISTENCE_ERROR",
        }
    }

    /// True when the caller sent something unusable, as opposed to a stage failing
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidRequest(_))
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn preprocess(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Preprocess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
