//! Runs training jobs on blocking worker threads
//!
//! Every job, synchronous or not, is registered and runs start to finish
//! on its own `spawn_blocking` thread. There is no cancellation: a caller
//! that disconnects does not stop its job. Synchronous jobs leave the
//! registry as soon as their outcome is returned.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::job_registry::JobRegistry;
use crate::models::{JobFailure, JobState, TrainingJob, TrainingRequest, TrainingResult};
use crate::pipeline::TrainingPipeline;

/// Outcome of one job
pub type JobOutcome = Result<TrainingResult, JobFailure>;

/// Run the pipeline, attributing any failure to the stage it happened in
pub fn execute<F>(pipeline: &TrainingPipeline, request: &TrainingRequest, mut on_state: F) -> JobOutcome
where
    F: FnMut(JobState),
{
    let mut stage = JobState::Received;
    let outcome = pipeline.run_with_progress(request, |state| {
        stage = state;
        on_state(state);
    });
    outcome.map_err(|err| JobFailure::from_pipeline(&err, stage))
}

#[derive(Clone)]
pub struct JobRunner {
    pipeline: Arc<TrainingPipeline>,
    registry: JobRegistry,
}

impl JobRunner {
    pub fn new(pipeline: Arc<TrainingPipeline>, registry: JobRegistry) -> Self {
        Self { pipeline, registry }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Register `request` as a job and start it in the background
    ///
    /// Returns the job as submitted plus a handle resolving to its outcome.
    pub async fn spawn(&self, request: TrainingRequest) -> (TrainingJob, JoinHandle<JobOutcome>) {
        let job = TrainingJob::new(&request);
        let job_id = job.job_id;
        self.registry.insert(job.clone()).await;
        info!(job_id = %job_id, task_id = %request.task_id, "Training job submitted");

        let pipeline = Arc::clone(&self.pipeline);
        let registry = self.registry.clone();
        let handle = tokio::spawn(async move {
            let worker_registry = registry.clone();
            let joined = tokio::task::spawn_blocking(move || {
                execute(&pipeline, &request, |state| {
                    worker_registry.transition_blocking(job_id, state)
                })
            })
            .await;

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Training worker did not finish");
                    let stage = registry
                        .get(job_id)
                        .await
                        .map(|job| job.state)
                        .unwrap_or(JobState::Received);
                    Err(JobFailure::internal(format!("Training worker failed: {e}"), stage))
                }
            };

            match &outcome {
                Ok(result) => registry.complete(job_id, result.clone()).await,
                Err(failure) => registry.fail(job_id, failure.clone()).await,
            }
            outcome
        });

        (job, handle)
    }

    /// Start a job without waiting for it
    pub async fn submit(&self, request: TrainingRequest) -> TrainingJob {
        let (job, _handle) = self.spawn(request).await;
        job
    }

    /// Run a job and wait for its outcome
    pub async fn run(&self, request: TrainingRequest) -> JobOutcome {
        let (job, handle) = self.spawn(request).await;
        let outcome = handle.await.unwrap_or_else(|e| {
            Err(JobFailure::internal(
                format!("Job {} was lost: {e}", job.job_id),
                JobState::Received,
            ))
        });
        self.registry.remove(job.job_id).await;
        outcome
    }
}
