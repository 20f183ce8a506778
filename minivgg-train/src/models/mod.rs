//! Data models for minivgg-train
//!
//! - Training request as sent by the orchestrator
//! - Training job state machine and failure records
//! - Scored training result

pub mod training_job;
pub mod training_request;
pub mod training_result;

pub use training_job::{JobFailure, JobState, StateTransition, TrainingJob};
pub use training_request::{validate_task_id, TrainingRequest};
pub use training_result::{TrainingResult, FIXED_FIELDS};
