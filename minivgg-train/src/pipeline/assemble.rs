//! Merges evaluation output, model location and hyperparameters into the
//! final result.

use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

use super::evaluate::Evaluation;
use crate::models::{TrainingResult, FIXED_FIELDS};

pub fn assemble_result(
    task_id: &str,
    model_path: &Path,
    evaluation: &Evaluation,
    hyperparameters: Map<String, Value>,
) -> TrainingResult {
    let mut extra_params = Map::new();
    for (key, value) in hyperparameters {
        if FIXED_FIELDS.contains(&key.as_str()) {
            warn!(task_id, key = %key, "Dropping hyperparameter that collides with a result field");
            continue;
        }
        extra_params.insert(key, value);
    }

    TrainingResult {
        task_id: task_id.to_string(),
        model_path: model_path.to_string_lossy().into_owned(),
        accuracy: evaluation.accuracy,
        classification_report: evaluation.report_text(),
        extra_params,
    }
}
