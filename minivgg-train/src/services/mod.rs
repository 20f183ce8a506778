//! Job services for minivgg-train

pub mod job_registry;
pub mod job_runner;

pub use job_registry::JobRegistry;
pub use job_runner::{execute, JobOutcome, JobRunner};
