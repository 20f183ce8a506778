//! Image classifier capability and the MiniVGGNet implementation
//!
//! The pipeline only talks to [`ImageClassifier`]; [`MiniVggClassifier`] is
//! the burn-backed network it trains by default.

pub mod backend;
pub mod classifier;
pub mod network;

use serde_json::{Map, Value};
use std::path::Path;

use minivgg_common::config::TrainingSettings;

use crate::pipeline::evaluate::accuracy_of;
use crate::pipeline::preprocess::ImageArray;
use crate::pipeline::split::Partition;
use crate::pipeline::PipelineResult;

pub use classifier::MiniVggClassifier;
pub use network::{MiniVgg, MiniVggConfig};

/// Sorted set of class labels; a label's position is its class index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut labels: Vec<String> = labels.into_iter().map(str::to_string).collect();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}

impl From<Vec<String>> for LabelVocabulary {
    fn from(labels: Vec<String>) -> Self {
        Self::from_labels(labels.iter().map(String::as_str))
    }
}

/// Architecture and optimization settings for one training run
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSpec {
    pub input_size: usize,
    pub channels: usize,
    pub base_filters: usize,
    pub dense_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl ClassifierSpec {
    pub fn from_settings(settings: &TrainingSettings, seed: u64) -> Self {
        Self {
            input_size: settings.image_size,
            channels: settings.channels,
            base_filters: settings.base_filters,
            dense_units: settings.dense_units,
            epochs: settings.epochs,
            batch_size: settings.batch_size,
            learning_rate: settings.learning_rate,
            seed,
        }
    }

    /// Expected `[channels, height, width]` of every input image
    pub fn input_shape(&self) -> [usize; 3] {
        [self.channels, self.input_size, self.input_size]
    }
}

/// A trainable, persistable image classifier
///
/// `fit` must be called before predictions mean anything, though `predict`
/// on an unfitted model still returns one label per image.
pub trait ImageClassifier: Sized {
    /// Extension of the file written by `save`
    const ARTIFACT_EXTENSION: &'static str;

    fn build(spec: &ClassifierSpec, vocabulary: LabelVocabulary) -> PipelineResult<Self>;

    fn fit(&mut self, train: &Partition) -> PipelineResult<()>;

    /// Build a classifier and fit it on `train`
    ///
    /// Implementations whose randomness is shared across threads override
    /// this so the whole run stays reproducible from `spec.seed`.
    fn train(
        spec: &ClassifierSpec,
        vocabulary: LabelVocabulary,
        train: &Partition,
    ) -> PipelineResult<Self> {
        let mut model = Self::build(spec, vocabulary)?;
        model.fit(train)?;
        Ok(model)
    }

    /// One label per image, in input order
    fn predict(&self, images: &[ImageArray]) -> PipelineResult<Vec<String>>;

    /// Accuracy on `partition`
    fn score(&self, partition: &Partition) -> PipelineResult<f64> {
        let predicted = self.predict(&partition.images)?;
        accuracy_of(&partition.labels, &predicted)
    }

    fn save(&self, path: &Path) -> PipelineResult<()>;

    fn load(path: &Path) -> PipelineResult<Self>;

    /// Introspectable settings, reported alongside results
    fn hyperparameters(&self) -> Map<String, Value>;

    fn vocabulary(&self) -> &LabelVocabulary;
}
