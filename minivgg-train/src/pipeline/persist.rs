//! Durable model storage
//!
//! Each task's model lives at `<output_dir>/<taskId>.<ext>`. Writing the
//! same taskId again replaces the previous file.

use std::path::PathBuf;
use tracing::info;

use super::error::{PipelineError, PipelineResult};
use crate::model::ImageClassifier;
use crate::models::validate_task_id;

#[derive(Debug, Clone)]
pub struct ModelStore {
    output_dir: PathBuf,
}

impl ModelStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Artifact path for `task_id`; the id must be a single path component
    pub fn model_path<C: ImageClassifier>(&self, task_id: &str) -> PipelineResult<PathBuf> {
        validate_task_id(task_id)?;
        Ok(self
            .output_dir
            .join(format!("{}.{}", task_id, C::ARTIFACT_EXTENSION)))
    }

    /// Write `model` and confirm the file landed
    pub fn persist<C: ImageClassifier>(&self, model: &C, task_id: &str) -> PipelineResult<PathBuf> {
        let path = self.model_path::<C>(task_id)?;

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| PipelineError::persistence(&self.output_dir, e))?;
        model.save(&path)?;

        if !path.is_file() {
            return Err(PipelineError::persistence(
                &path,
                "model file missing after save",
            ));
        }

        info!(path = %path.display(), "Model saved");
        Ok(path)
    }

    pub fn load<C: ImageClassifier>(&self, task_id: &str) -> PipelineResult<C> {
        let path = self.model_path::<C>(task_id)?;
        if !path.is_file() {
            return Err(PipelineError::persistence(&path, "no saved model"));
        }
        C::load(&path)
    }
}
