//! MiniVGGNet classifier: fitting, prediction and persistence
//!
//! Fitting uses mini-batch SGD with Nesterov momentum and cross-entropy
//! loss. Weight init, dropout masks and epoch shuffling are all driven by
//! the job seed. The saved artifact is a single named-MessagePack record
//! holding the weights, the label vocabulary and the architecture shape.

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
    tensor::{backend::Backend, ElementConversion, Int, Tensor, TensorData},
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};

use super::backend::{self, InferenceBackend, TrainingBackend};
use super::network::{MiniVgg, MiniVggConfig};
use super::{ClassifierSpec, ImageClassifier, LabelVocabulary};
use crate::pipeline::preprocess::ImageArray;
use crate::pipeline::split::Partition;
use crate::pipeline::{PipelineError, PipelineResult};

pub const MODEL_NAME: &str = "MiniVGGNet";
pub const MOMENTUM: f64 = 0.9;

type ArtifactRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Everything needed to rebuild a fitted classifier
#[derive(Record)]
pub struct MiniVggArtifact<B: Backend> {
    network: <MiniVgg<B> as Module<B>>::Record,
    labels: Vec<String>,
    input_size: usize,
    channels: usize,
    base_filters: usize,
    dense_units: usize,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    seed: u64,
}

#[derive(Debug)]
enum Network {
    Untrained(MiniVgg<TrainingBackend>),
    Trained(MiniVgg<InferenceBackend>),
}

#[derive(Debug)]
pub struct MiniVggClassifier {
    spec: ClassifierSpec,
    config: MiniVggConfig,
    vocabulary: LabelVocabulary,
    network: Network,
}

fn network_config(spec: &ClassifierSpec, num_classes: usize) -> MiniVggConfig {
    MiniVggConfig::new(num_classes)
        .with_input_size(spec.input_size)
        .with_channels(spec.channels)
        .with_base_filters(spec.base_filters)
        .with_dense_units(spec.dense_units)
}

/// Stack CHW arrays into an NCHW tensor
fn image_batch<B: Backend>(
    images: &[&ImageArray],
    shape: [usize; 3],
    device: &B::Device,
) -> Tensor<B, 4> {
    let [channels, height, width] = shape;
    let mut data = Vec::with_capacity(images.len() * channels * height * width);
    for image in images {
        data.extend_from_slice(image.data());
    }
    Tensor::<B, 4>::from_floats(
        TensorData::new(data, [images.len(), channels, height, width]),
        device,
    )
}

impl MiniVggClassifier {
    pub fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.network, Network::Trained(_))
    }

    fn inference_network(&self) -> MiniVgg<InferenceBackend> {
        match &self.network {
            Network::Trained(model) => model.clone(),
            Network::Untrained(model) => model.clone().valid(),
        }
    }

    fn check_shapes(&self, images: &[ImageArray]) -> Result<(), String> {
        let expected = self.spec.input_shape();
        match images.iter().position(|image| image.shape() != expected) {
            Some(i) => Err(format!(
                "Image {} has shape {:?}, expected {:?}",
                i,
                images[i].shape(),
                expected
            )),
            None => Ok(()),
        }
    }

    fn class_indices(&self, labels: &[String]) -> PipelineResult<Vec<i64>> {
        labels
            .iter()
            .map(|label| {
                self.vocabulary
                    .index_of(label)
                    .map(|i| i as i64)
                    .ok_or_else(|| {
                        PipelineError::Training(format!("Label {label:?} is not in the vocabulary"))
                    })
            })
            .collect()
    }
}

impl ImageClassifier for MiniVggClassifier {
    const ARTIFACT_EXTENSION: &'static str = "mpk";

    fn build(spec: &ClassifierSpec, vocabulary: LabelVocabulary) -> PipelineResult<Self> {
        if vocabulary.is_empty() {
            return Err(PipelineError::Training(
                "Cannot build a classifier without classes".to_string(),
            ));
        }
        if spec.input_size == 0 || spec.input_size % 4 != 0 {
            return Err(PipelineError::Training(format!(
                "Input size {} must be a positive multiple of 4",
                spec.input_size
            )));
        }

        backend::seed(spec.seed);
        let config = network_config(spec, vocabulary.len());
        let network = config.init::<TrainingBackend>(&backend::default_device());
        debug!(
            classes = vocabulary.len(),
            input = ?spec.input_shape(),
            "Built {}",
            MODEL_NAME
        );

        Ok(Self {
            spec: spec.clone(),
            config,
            vocabulary,
            network: Network::Untrained(network),
        })
    }

    fn fit(&mut self, train: &Partition) -> PipelineResult<()> {
        if train.is_empty() {
            return Err(PipelineError::Training("Training partition is empty".to_string()));
        }
        if train.images.len() != train.labels.len() {
            return Err(PipelineError::Training(format!(
                "{} images but {} labels",
                train.images.len(),
                train.labels.len()
            )));
        }
        self.check_shapes(&train.images)
            .map_err(PipelineError::Training)?;
        let targets = self.class_indices(&train.labels)?;

        let mut model = match &self.network {
            Network::Untrained(model) => model.clone(),
            Network::Trained(_) => {
                return Err(PipelineError::Training("Model is already fitted".to_string()))
            }
        };

        let device = backend::default_device();
        let loss_fn: CrossEntropyLoss<TrainingBackend> = CrossEntropyLossConfig::new().init(&device);
        let mut optimizer = SgdConfig::new()
            .with_momentum(Some(
                MomentumConfig::new()
                    .with_momentum(MOMENTUM)
                    .with_dampening(0.0)
                    .with_nesterov(true),
            ))
            .init();

        let batch_size = self.spec.batch_size.max(1);
        let shape = self.spec.input_shape();
        let mut rng = ChaCha8Rng::seed_from_u64(self.spec.seed);
        let mut order: Vec<usize> = (0..train.len()).collect();

        for epoch in 0..self.spec.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0f64;
            let mut batches = 0usize;

            for chunk in order.chunks(batch_size) {
                let images: Vec<&ImageArray> = chunk.iter().map(|&i| &train.images[i]).collect();
                let batch_targets: Vec<i64> = chunk.iter().map(|&i| targets[i]).collect();

                let inputs = image_batch::<TrainingBackend>(&images, shape, &device);
                let labels = Tensor::<TrainingBackend, 1, Int>::from_data(
                    TensorData::new(batch_targets, [chunk.len()]),
                    &device,
                );

                let output = model.forward(inputs);
                let loss = loss_fn.forward(output, labels);
                let loss_value: f64 = loss.clone().into_scalar().elem();
                if !loss_value.is_finite() {
                    return Err(PipelineError::Training(format!(
                        "Loss diverged in epoch {}",
                        epoch + 1
                    )));
                }

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optimizer.step(self.spec.learning_rate, model, grads);

                epoch_loss += loss_value;
                batches += 1;
                debug!(epoch = epoch + 1, batch = batches, loss = loss_value, "Batch complete");
            }

            info!(
                epoch = epoch + 1,
                epochs = self.spec.epochs,
                loss = epoch_loss / batches.max(1) as f64,
                "Epoch complete"
            );
        }

        self.network = Network::Trained(model.valid());
        Ok(())
    }

    /// Weight init and every dropout mask draw from the backend RNG, so the
    /// lock is held from seeding until the last batch.
    fn train(
        spec: &ClassifierSpec,
        vocabulary: LabelVocabulary,
        train: &Partition,
    ) -> PipelineResult<Self> {
        let _rng = backend::rng_guard();
        let mut model = Self::build(spec, vocabulary)?;
        model.fit(train)?;
        Ok(model)
    }

    fn predict(&self, images: &[ImageArray]) -> PipelineResult<Vec<String>> {
        self.check_shapes(images).map_err(PipelineError::Evaluation)?;

        let device = backend::default_device();
        let model = self.inference_network();
        let shape = self.spec.input_shape();
        let mut predictions = Vec::with_capacity(images.len());

        for chunk in images.chunks(self.spec.batch_size.max(1)) {
            let refs: Vec<&ImageArray> = chunk.iter().collect();
            let logits = model.forward(image_batch::<InferenceBackend>(&refs, shape, &device));
            let indices = logits.argmax(1).into_data();
            for index in indices.iter::<i64>() {
                let label = self.vocabulary.label(index as usize).ok_or_else(|| {
                    PipelineError::Evaluation(format!("Predicted class {index} is out of range"))
                })?;
                predictions.push(label.to_string());
            }
        }

        Ok(predictions)
    }

    fn save(&self, path: &Path) -> PipelineResult<()> {
        let artifact = MiniVggArtifact::<InferenceBackend> {
            network: self.inference_network().into_record(),
            labels: self.vocabulary.labels().to_vec(),
            input_size: self.spec.input_size,
            channels: self.spec.channels,
            base_filters: self.spec.base_filters,
            dense_units: self.spec.dense_units,
            epochs: self.spec.epochs,
            batch_size: self.spec.batch_size,
            learning_rate: self.spec.learning_rate,
            seed: self.spec.seed,
        };

        <ArtifactRecorder as Recorder<InferenceBackend>>::record(
            &ArtifactRecorder::new(),
            artifact,
            path.to_path_buf(),
        )
        .map_err(|e| PipelineError::persistence(path, format!("{:?}", e)))
    }

    fn load(path: &Path) -> PipelineResult<Self> {
        let device = backend::default_device();
        let artifact: MiniVggArtifact<InferenceBackend> =
            <ArtifactRecorder as Recorder<InferenceBackend>>::load(
                &ArtifactRecorder::new(),
                path.to_path_buf(),
                &device,
            )
            .map_err(|e| PipelineError::persistence(path, format!("{:?}", e)))?;

        let spec = ClassifierSpec {
            input_size: artifact.input_size,
            channels: artifact.channels,
            base_filters: artifact.base_filters,
            dense_units: artifact.dense_units,
            epochs: artifact.epochs,
            batch_size: artifact.batch_size,
            learning_rate: artifact.learning_rate,
            seed: artifact.seed,
        };
        let vocabulary = LabelVocabulary::from(artifact.labels);
        let config = network_config(&spec, vocabulary.len());
        let network = config
            .init::<InferenceBackend>(&device)
            .load_record(artifact.network);

        Ok(Self {
            spec,
            config,
            vocabulary,
            network: Network::Trained(network),
        })
    }

    fn hyperparameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("model".to_string(), json!(MODEL_NAME));
        params.insert("width".to_string(), json!(self.spec.input_size));
        params.insert("height".to_string(), json!(self.spec.input_size));
        params.insert("depth".to_string(), json!(self.spec.channels));
        params.insert("classes".to_string(), json!(self.vocabulary.len()));
        params.insert("epochs".to_string(), json!(self.spec.epochs));
        params.insert("batch_size".to_string(), json!(self.spec.batch_size));
        params.insert("learning_rate".to_string(), json!(self.spec.learning_rate));
        params.insert("optimizer".to_string(), json!("sgd"));
        params.insert("momentum".to_string(), json!(MOMENTUM));
        params.insert("nesterov".to_string(), json!(true));
        params.insert("base_filters".to_string(), json!(self.config.base_filters));
        params.insert("dense_units".to_string(), json!(self.config.dense_units));
        params.insert("conv_dropout".to_string(), json!(self.config.conv_dropout));
        params.insert("dense_dropout".to_string(), json!(self.config.dense_dropout));
        params.insert("seed".to_string(), json!(self.spec.seed));
        params.insert("backend".to_string(), json!(backend::backend_name()));
        params
    }

    fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tiny_spec() -> ClassifierSpec {
        ClassifierSpec {
            input_size: 8,
            channels: 3,
            base_filters: 2,
            dense_units: 4,
            epochs: 1,
            batch_size: 4,
            learning_rate: 0.01,
            seed: 42,
        }
    }

    fn solid(value: f32) -> ImageArray {
        ImageArray::new(vec![value; 3 * 8 * 8], [3, 8, 8]).unwrap()
    }

    fn partition(samples: &[(f32, &str)]) -> Partition {
        Partition {
            images: samples.iter().map(|(v, _)| solid(*v)).collect(),
            labels: samples.iter().map(|(_, l)| l.to_string()).collect(),
            sources: Vec::new(),
        }
    }

    fn vocabulary(labels: &[&str]) -> LabelVocabulary {
        LabelVocabulary::from_labels(labels.iter().copied())
    }

    #[test]
    fn predicts_one_known_label_per_image() {
        let mut model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["cat", "dog"])).unwrap();
        let train = partition(&[(0.1, "cat"), (0.9, "dog"), (0.2, "cat"), (0.8, "dog"), (0.5, "cat")]);
        model.fit(&train).unwrap();
        assert!(model.is_fitted());

        let predictions = model.predict(&train.images).unwrap();
        assert_eq!(predictions.len(), 5);
        assert!(predictions.iter().all(|p| p == "cat" || p == "dog"));

        let score = model.score(&train).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn single_class_always_predicts_that_class() {
        let mut model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["only"])).unwrap();
        let train = partition(&[(0.1, "only"), (0.7, "only"), (0.3, "only")]);
        model.fit(&train).unwrap();
        assert_eq!(model.score(&train).unwrap(), 1.0);
    }

    #[test]
    fn empty_partition_is_a_training_error() {
        let mut model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["cat"])).unwrap();
        let err = model.fit(&Partition::default()).unwrap_err();
        assert_eq!(err.kind(), "TrainingError");
    }

    #[test]
    fn wrong_shape_is_a_training_error() {
        let mut model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["cat"])).unwrap();
        let train = Partition {
            images: vec![ImageArray::new(vec![0.0; 3 * 4 * 4], [3, 4, 4]).unwrap()],
            labels: vec!["cat".to_string()],
            sources: Vec::new(),
        };
        let err = model.fit(&train).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
        assert!(err.to_string().contains("expected [3, 8, 8]"));
    }

    #[test]
    fn mismatched_lengths_are_a_training_error() {
        let mut model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["cat"])).unwrap();
        let mut train = partition(&[(0.1, "cat"), (0.2, "cat")]);
        train.labels.pop();
        assert!(matches!(model.fit(&train), Err(PipelineError::Training(_))));
    }

    #[test]
    fn save_and_load_reproduce_predictions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.mpk");

        let mut model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["cat", "dog"])).unwrap();
        let train = partition(&[(0.1, "cat"), (0.9, "dog"), (0.2, "cat"), (0.8, "dog")]);
        model.fit(&train).unwrap();
        model.save(&path).unwrap();
        assert!(path.exists());

        let loaded = MiniVggClassifier::load(&path).unwrap();
        assert_eq!(loaded.vocabulary(), model.vocabulary());
        assert_eq!(loaded.spec(), model.spec());
        assert_eq!(
            loaded.predict(&train.images).unwrap(),
            model.predict(&train.images).unwrap()
        );
    }

    #[test]
    fn loading_a_missing_artifact_is_a_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = MiniVggClassifier::load(&temp_dir.path().join("absent.mpk")).unwrap_err();
        assert_eq!(err.kind(), "PersistenceError");
    }

    #[test]
    fn hyperparameters_describe_the_network() {
        let model = MiniVggClassifier::build(&tiny_spec(), vocabulary(&["a", "b", "c"])).unwrap();
        let params = model.hyperparameters();
        assert_eq!(params["model"], json!("MiniVGGNet"));
        assert_eq!(params["width"], json!(8));
        assert_eq!(params["depth"], json!(3));
        assert_eq!(params["classes"], json!(3));
        assert_eq!(params["nesterov"], json!(true));
        assert_eq!(params["seed"], json!(42));
    }

    #[test]
    fn train_builds_and_fits_in_one_step() {
        let train = partition(&[(0.1, "cat"), (0.9, "dog"), (0.2, "cat")]);
        let model =
            MiniVggClassifier::train(&tiny_spec(), vocabulary(&["cat", "dog"]), &train).unwrap();
        assert!(model.is_fitted());
        assert_eq!(model.predict(&train.images).unwrap().len(), 3);
    }

    #[test]
    fn input_size_must_survive_two_pools() {
        let spec = ClassifierSpec {
            input_size: 10,
            ..tiny_spec()
        };
        assert!(MiniVggClassifier::build(&spec, vocabulary(&["a"])).is_err());
    }
}
