//! Scored result of a completed training job

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the result itself; hyperparameters never override them
pub const FIXED_FIELDS: [&str; 4] = ["taskId", "modelPath", "accuracy", "classificationReport"];

/// Immutable once assembled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResult {
    pub task_id: String,
    pub model_path: String,
    /// Fraction of correct predictions on the evaluation partition.
    /// In train-only mode this is measured on the training data and is an
    /// optimistic fit estimate, not held-out accuracy.
    pub accuracy: f64,
    pub classification_report: String,
    /// Model hyperparameters (epochs, batch size, input shape, ...)
    pub extra_params: Map<String, Value>,
}

impl TrainingResult {
    /// Response shape of `POST /train`: hyperparameters merged as top-level keys
    ///
    /// The four fixed fields are inserted last so they win any key collision.
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut flat = Map::new();
        for (key, value) in &self.extra_params {
            if !FIXED_FIELDS.contains(&key.as_str()) {
                flat.insert(key.clone(), value.clone());
            }
        }

        flat.insert("taskId".to_string(), Value::from(self.task_id.clone()));
        flat.insert("modelPath".to_string(), Value::from(self.model_path.clone()));
        flat.insert("accuracy".to_string(), Value::from(self.accuracy));
        flat.insert(
            "classificationReport".to_string(),
            Value::from(self.classification_report.clone()),
        );
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> TrainingResult {
        let mut extra_params = Map::new();
        extra_params.insert("epochs".to_string(), json!(10));
        extra_params.insert("batch_size".to_string(), json!(32));
        TrainingResult {
            task_id: "job-7".to_string(),
            model_path: "/models/job-7.mpk".to_string(),
            accuracy: 0.84,
            classification_report: "report".to_string(),
            extra_params,
        }
    }

    #[test]
    fn flat_map_contains_fixed_fields_and_params() {
        let flat = sample_result().to_flat_map();
        assert_eq!(flat["taskId"], json!("job-7"));
        assert_eq!(flat["modelPath"], json!("/models/job-7.mpk"));
        assert_eq!(flat["accuracy"], json!(0.84));
        assert_eq!(flat["classificationReport"], json!("report"));
        assert_eq!(flat["epochs"], json!(10));
        assert_eq!(flat["batch_size"], json!(32));
        assert_eq!(flat.len(), 6);
    }

    #[test]
    fn fixed_fields_win_collisions() {
        let mut result = sample_result();
        result.extra_params.insert("accuracy".to_string(), json!("bogus"));
        result.extra_params.insert("taskId".to_string(), json!("other"));

        let flat = result.to_flat_map();
        assert_eq!(flat["accuracy"], json!(0.84));
        assert_eq!(flat["taskId"], json!("job-7"));
    }

    #[test]
    fn typed_form_keeps_params_nested() {
        let value = serde_json::to_value(sample_result()).unwrap();
        assert_eq!(value["extraParams"]["epochs"], json!(10));
        assert!(value.get("epochs").is_none());
    }
}
