//! Training pipeline
//!
//! Runs one training request start to finish:
//!
//! 1. **Loading**: discover image files under the dataset root
//! 2. **Preprocessing**: decode, resize and normalize every image
//! 3. **Splitting**: held-out or train-only partitioning
//! 4. **Training**: build and fit the classifier
//! 5. **Evaluating**: accuracy and classification report
//! 6. **Persisting**: write the model to `<output_dir>/<taskId>.<ext>`
//! 7. **AssemblingResult**: merge metrics, model path and hyperparameters
//!
//! The run is synchronous and CPU-bound; callers in async contexts run it
//! on a blocking worker. The first failing stage aborts the run and nothing
//! is persisted unless every earlier stage succeeded.

pub mod assemble;
pub mod error;
pub mod evaluate;
pub mod loader;
pub mod persist;
pub mod preprocess;
pub mod report;
pub mod split;

pub use error::{PipelineError, PipelineResult};

use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::info;

use minivgg_common::config::TrainingSettings;
use minivgg_common::{Error as ConfigError, Result as ConfigResult};

use crate::model::{ClassifierSpec, ImageClassifier, LabelVocabulary, MiniVggClassifier};
use crate::models::{JobState, TrainingRequest, TrainingResult};
use assemble::assemble_result;
use evaluate::Evaluator;
use loader::ImageCorpusLoader;
use persist::ModelStore;
use preprocess::Preprocessor;
use split::SplitPolicy;

pub struct TrainingPipeline<C: ImageClassifier = MiniVggClassifier> {
    settings: TrainingSettings,
    store: ModelStore,
    loader: ImageCorpusLoader,
    preprocessor: Preprocessor,
    _classifier: PhantomData<fn() -> C>,
}

impl<C: ImageClassifier> TrainingPipeline<C> {
    /// Fails if `settings` do not validate
    pub fn new(output_dir: impl Into<PathBuf>, settings: TrainingSettings) -> ConfigResult<Self> {
        settings.validate()?;
        let size = u32::try_from(settings.image_size).map_err(|_| {
            ConfigError::Config(format!(
                "training.image_size {} does not fit an image dimension",
                settings.image_size
            ))
        })?;

        Ok(Self {
            preprocessor: Preprocessor::new(size, settings.channels),
            settings,
            store: ModelStore::new(output_dir),
            loader: ImageCorpusLoader::new(),
            _classifier: PhantomData,
        })
    }

    /// Reload a previously persisted model
    pub fn load_model(&self, task_id: &str) -> PipelineResult<C> {
        self.store.load(task_id)
    }

    fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::new(self.settings.test_fraction, self.settings.stratified)
    }

    fn job_seed(&self) -> u64 {
        if self.settings.random_seed {
            rand::random()
        } else {
            self.settings.seed
        }
    }

    pub fn run(&self, request: &TrainingRequest) -> PipelineResult<TrainingResult> {
        self.run_with_progress(request, |_| {})
    }

    /// Run the pipeline, calling `progress` as each stage starts
    pub fn run_with_progress<F>(
        &self,
        request: &TrainingRequest,
        mut progress: F,
    ) -> PipelineResult<TrainingResult>
    where
        F: FnMut(JobState),
    {
        let task_id = request.task_id.as_str();
        info!(task_id, "Received training request");
        request.validate()?;
        info!(task_id, dataset = %request.dataset_name(), "Dataset received for training");

        progress(JobState::Loading);
        let paths = self.loader.discover(&request.dataset)?;
        info!(task_id, images = paths.len(), "Discovered dataset images");

        progress(JobState::Preprocessing);
        let images = self.loader.materialize(&paths, &self.preprocessor)?;

        progress(JobState::Splitting);
        let vocabulary = LabelVocabulary::from_labels(images.iter().map(|i| i.label.as_str()));
        let seed = self.job_seed();
        let split = self.split_policy().apply(images, request.train_only, seed);
        info!(
            task_id,
            train = split.train().len(),
            evaluation = split.evaluation().len(),
            classes = vocabulary.len(),
            held_out = split.is_held_out(),
            seed,
            "Prepared training data"
        );

        progress(JobState::Training);
        info!(task_id, "Fitting model");
        let spec = ClassifierSpec::from_settings(&self.settings, seed);
        let model = C::train(&spec, vocabulary.clone(), split.train())?;
        info!(task_id, "Model fitting complete");

        progress(JobState::Evaluating);
        if !split.is_held_out() {
            info!(task_id, "Testing not required, scoring on training data");
        }
        let evaluation =
            Evaluator::for_split(&split, &vocabulary).evaluate(&model, split.evaluation())?;
        info!(task_id, accuracy = evaluation.accuracy, "Scored model");

        progress(JobState::Persisting);
        let model_path = self.store.persist(&model, task_id)?;

        progress(JobState::AssemblingResult);
        let result = assemble_result(task_id, &model_path, &evaluation, model.hyperparameters());
        info!(task_id, model_path = %model_path.display(), "Training request complete");
        Ok(result)
    }
}
