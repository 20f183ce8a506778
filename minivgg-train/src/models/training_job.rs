//! Training job state machine
//!
//! A job progresses through the pipeline stages in order:
//! RECEIVED → LOADING → PREPROCESSING → SPLITTING → TRAINING → EVALUATING →
//! PERSISTING → ASSEMBLING_RESULT → COMPLETE
//!
//! Any stage may move to FAILED. There is no retry and no resumption; a
//! failed job has to be resubmitted from scratch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{TrainingRequest, TrainingResult};
use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted, not yet started
    Received,
    /// Dataset discovery
    Loading,
    /// Image decoding and resizing
    Preprocessing,
    /// Held-out or train-only partitioning
    Splitting,
    /// Model construction and fitting
    Training,
    /// Prediction, accuracy and classification report
    Evaluating,
    /// Model serialization
    Persisting,
    AssemblingResult,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

/// State transition event, logged by the job registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// Why a job failed, in the shape reported to pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    /// Machine code, e.g. "DATASET_ERROR"
    pub code: String,
    /// Error kind, e.g. "DatasetError"
    pub kind: String,
    /// Stage the job was in when it failed
    pub stage: JobState,
    pub message: String,
}

impl JobFailure {
    pub fn from_pipeline(error: &PipelineError, stage: JobState) -> Self {
        Self {
            code: error.code().to_string(),
            kind: error.kind().to_string(),
            stage,
            message: error.to_string(),
        }
    }

    /// Worker panicked or was lost before producing an outcome
    pub fn internal(message: impl Into<String>, stage: JobState) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            kind: "InternalError".to_string(),
            stage,
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.code == "INVALID_REQUEST"
    }
}

/// One submitted job (in-memory only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJob {
    pub job_id: Uuid,
    pub task_id: String,
    pub train_only: bool,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TrainingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl TrainingJob {
    pub fn new(request: &TrainingRequest) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            task_id: request.task_id.clone(),
            train_only: request.train_only,
            state: JobState::Received,
            submitted_at: Utc::now(),
            ended_at: None,
            result: None,
            error: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: JobState) -> StateTransition {
        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        transition
    }

    pub fn complete(&mut self, result: TrainingResult) -> StateTransition {
        self.result = Some(result);
        self.transition_to(JobState::Complete)
    }

    /// Record the failure against the stage the job was in
    pub fn fail_with(&mut self, failure: JobFailure) -> StateTransition {
        self.error = Some(failure);
        self.transition_to(JobState::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TrainingJob {
        TrainingJob::new(&TrainingRequest::new("job-1", "/data", false))
    }

    #[test]
    fn new_job_is_received() {
        let job = job();
        assert_eq!(job.state, JobState::Received);
        assert_eq!(job.task_id, "job-1");
        assert!(job.ended_at.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn transitions_record_old_and_new_state() {
        let mut job = job();
        let transition = job.transition_to(JobState::Loading);
        assert_eq!(transition.old_state, JobState::Received);
        assert_eq!(transition.new_state, JobState::Loading);
        assert_eq!(job.state, JobState::Loading);
        assert!(job.ended_at.is_none());
    }

    #[test]
    fn failure_keeps_stage_and_sets_end_time() {
        let mut job = job();
        job.transition_to(JobState::Training);
        let error = PipelineError::Training("training partition is empty".to_string());
        job.fail_with(JobFailure::from_pipeline(&error, job.state));

        assert_eq!(job.state, JobState::Failed);
        assert!(job.ended_at.is_some());
        let failure = job.error.as_ref().unwrap();
        assert_eq!(failure.stage, JobState::Training);
        assert_eq!(failure.kind, "TrainingError");
        assert_eq!(failure.code, "TRAINING_ERROR");
    }

    #[test]
    fn states_serialize_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(JobState::AssemblingResult).unwrap(),
            serde_json::json!("ASSEMBLING_RESULT")
        );
    }
}
