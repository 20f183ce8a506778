//! Evaluation of a fitted classifier
//!
//! The report's label set depends on the split mode: held-out runs report
//! every class of the full dataset (absent ones with support 0), train-only
//! runs report the classes present in the data that was scored.

use std::collections::BTreeSet;
use tracing::debug;

use super::error::{PipelineError, PipelineResult};
use super::report::ClassificationReport;
use super::split::{DatasetSplit, Partition};
use crate::model::{ImageClassifier, LabelVocabulary};

/// Accuracy, report and the predictions they were computed from
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub predictions: Vec<String>,
}

impl Evaluation {
    pub fn report_text(&self) -> String {
        self.report.to_string()
    }
}

/// Fraction of positions where `predicted` equals `truth`
pub fn accuracy_of(truth: &[String], predicted: &[String]) -> PipelineResult<f64> {
    check_lengths(truth, predicted)?;
    if truth.is_empty() {
        return Err(PipelineError::Evaluation(
            "Cannot score an empty evaluation partition".to_string(),
        ));
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

fn check_lengths(truth: &[String], predicted: &[String]) -> PipelineResult<()> {
    if truth.len() != predicted.len() {
        return Err(PipelineError::Evaluation(format!(
            "{} predictions for {} ground-truth labels",
            predicted.len(),
            truth.len()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    labels: Vec<String>,
}

impl Evaluator {
    /// Report over an explicit, ordered label set
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Pick the report label set for `split`
    pub fn for_split(split: &DatasetSplit, vocabulary: &LabelVocabulary) -> Self {
        if split.is_held_out() {
            Self::new(vocabulary.labels().to_vec())
        } else {
            let observed: BTreeSet<&String> = split.evaluation().labels.iter().collect();
            Self::new(observed.into_iter().cloned().collect())
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Predict every image of `partition` in order and score the result
    pub fn evaluate<C: ImageClassifier>(
        &self,
        model: &C,
        partition: &Partition,
    ) -> PipelineResult<Evaluation> {
        let predictions = model.predict(&partition.images)?;
        self.score(&partition.labels, predictions)
    }

    pub fn score(&self, truth: &[String], predictions: Vec<String>) -> PipelineResult<Evaluation> {
        let accuracy = accuracy_of(truth, &predictions)?;
        let report = ClassificationReport::compute(truth, &predictions, &self.labels);
        debug!(
            accuracy,
            samples = truth.len(),
            classes = self.labels.len(),
            "Scored predictions"
        );
        Ok(Evaluation {
            accuracy,
            report,
            predictions,
        })
    }
}
