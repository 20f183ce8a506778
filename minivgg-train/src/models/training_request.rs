//! Training request accepted from the orchestrator

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::pipeline::{PipelineError, PipelineResult};

/// One training job as dispatched by the master node
///
/// The dataset must follow the `root/<label>/<image>` layout: every image is
/// labeled by the name of the directory that immediately contains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    /// Caller-assigned job identifier, also the persisted model's file stem
    pub task_id: String,

    /// Skip the held-out split and evaluate on the training data
    #[serde(default, deserialize_with = "null_as_false")]
    pub train_only: bool,

    /// Dataset root directory
    pub dataset: PathBuf,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl TrainingRequest {
    pub fn new(task_id: impl Into<String>, dataset: impl Into<PathBuf>, train_only: bool) -> Self {
        Self {
            task_id: task_id.into(),
            train_only,
            dataset: dataset.into(),
        }
    }

    /// Reject requests whose taskId cannot safely name a file
    pub fn validate(&self) -> PipelineResult<()> {
        validate_task_id(&self.task_id)?;
        if self.dataset.as_os_str().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "dataset path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Last path component of the dataset, for log lines
    pub fn dataset_name(&self) -> String {
        self.dataset
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dataset.display().to_string())
    }
}

/// A taskId must be exactly one normal path component
pub fn validate_task_id(task_id: &str) -> PipelineResult<()> {
    if task_id.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(
            "taskId must not be empty".to_string(),
        ));
    }
    if task_id.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(PipelineError::InvalidRequest(format!(
            "taskId must not contain path separators: {:?}",
            task_id
        )));
    }

    let mut components = Path::new(task_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(PipelineError::InvalidRequest(format!(
            "taskId is not a plain file name: {:?}",
            task_id
        ))),
    }
}
