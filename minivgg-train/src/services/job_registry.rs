//! In-memory registry of submitted training jobs
//!
//! Nothing is persisted. Running jobs are always kept; once a job finishes
//! it stays pollable until [`RETAINED_FINISHED_JOBS`] newer jobs have
//! finished after it, or until its owner removes it. State updates from pipeline worker threads go through the `*_blocking`
//! methods, which must not be called from async context.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{JobFailure, JobState, StateTransition, TrainingJob, TrainingResult};

/// Finished jobs kept for status polling
pub const RETAINED_FINISHED_JOBS: usize = 100;

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<Uuid, TrainingJob>,
    /// Finished job ids, oldest first
    finished: VecDeque<Uuid>,
}

impl JobTable {
    fn remove(&mut self, job_id: Uuid) -> Option<TrainingJob> {
        self.finished.retain(|id| *id != job_id);
        self.jobs.remove(&job_id)
    }

    fn mark_finished(&mut self, job_id: Uuid) {
        self.finished.push_back(job_id);
        while self.finished.len() > RETAINED_FINISHED_JOBS {
            if let Some(evicted) = self.finished.pop_front() {
                self.jobs.remove(&evicted);
                debug!(job_id = %evicted, "Evicted finished job");
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    table: Arc<RwLock<JobTable>>,
    last_error: Arc<RwLock<Option<String>>>,
}

fn log_transition(task_id: &str, transition: &StateTransition) {
    info!(
        job_id = %transition.job_id,
        task_id,
        old_state = ?transition.old_state,
        new_state = ?transition.new_state,
        "Job state transition"
    );
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: TrainingJob) {
        self.table.write().await.jobs.insert(job.job_id, job);
    }

    pub async fn get(&self, job_id: Uuid) -> Option<TrainingJob> {
        self.table.read().await.jobs.get(&job_id).cloned()
    }

    /// Drop a job whose outcome has already been handed to its caller
    pub async fn remove(&self, job_id: Uuid) -> Option<TrainingJob> {
        self.table.write().await.remove(job_id)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.table.read().await.jobs.len()
    }

    /// Jobs not yet complete or failed
    pub async fn active_count(&self) -> usize {
        self.table
            .read()
            .await
            .jobs
            .values()
            .filter(|job| !job.is_terminal())
            .count()
    }

    /// Message of the most recent job failure
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Advance a running job from a worker thread
    pub fn transition_blocking(&self, job_id: Uuid, state: JobState) {
        let mut table = self.table.blocking_write();
        match table.jobs.get_mut(&job_id) {
            Some(job) => {
                let transition = job.transition_to(state);
                log_transition(&job.task_id, &transition);
            }
            None => warn!(job_id = %job_id, "State update for unknown job"),
        }
    }

    pub async fn complete(&self, job_id: Uuid, result: TrainingResult) {
        let mut table = self.table.write().await;
        if let Some(job) = table.jobs.get_mut(&job_id) {
            let transition = job.complete(result);
            log_transition(&job.task_id, &transition);
            table.mark_finished(job_id);
        }
    }

    pub async fn fail(&self, job_id: Uuid, failure: JobFailure) {
        *self.last_error.write().await = Some(failure.message.clone());

        let mut table = self.table.write().await;
        if let Some(job) = table.jobs.get_mut(&job_id) {
            warn!(
                job_id = %job_id,
                task_id = %job.task_id,
                stage = ?failure.stage,
                kind = %failure.kind,
                "Training job failed: {}",
                failure.message
            );
            let transition = job.fail_with(failure);
            log_transition(&job.task_id, &transition);
            table.mark_finished(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainingRequest;
    use serde_json::Map;

    fn job(task_id: &str) -> TrainingJob {
        TrainingJob::new(&TrainingRequest::new(task_id, "/data", false))
    }

    fn result(task_id: &str) -> TrainingResult {
        TrainingResult {
            task_id: task_id.to_string(),
            model_path: format!("/m/{task_id}.mpk"),
            accuracy: 0.5,
            classification_report: String::new(),
            extra_params: Map::new(),
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let registry = JobRegistry::new();
        let job = job("a");
        let id = job.job_id;
        registry.insert(job).await;

        assert_eq!(registry.get(id).await.unwrap().task_id, "a");
        assert!(registry.get(Uuid::new_v4()).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn active_count_excludes_terminal_jobs() {
        let registry = JobRegistry::new();
        let (a, b) = (job("a"), job("b"));
        let (a_id, b_id) = (a.job_id, b.job_id);
        registry.insert(a).await;
        registry.insert(b).await;
        assert_eq!(registry.active_count().await, 2);

        registry.complete(a_id, result("a")).await;
        assert_eq!(registry.active_count().await, 1);

        let failure = JobFailure::internal("boom", JobState::Training);
        registry.fail(b_id, failure).await;
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(registry.last_error().await.as_deref(), Some("boom"));
        assert_eq!(registry.get(b_id).await.unwrap().state, JobState::Failed);
    }

    #[tokio::test]
    async fn blocking_transition_from_worker_thread() {
        let registry = JobRegistry::new();
        let job = job("w");
        let id = job.job_id;
        registry.insert(job).await;

        let worker = registry.clone();
        tokio::task::spawn_blocking(move || worker.transition_blocking(id, JobState::Training))
            .await
            .unwrap();

        assert_eq!(registry.get(id).await.unwrap().state, JobState::Training);
    }

    #[tokio::test]
    async fn finished_jobs_beyond_retention_are_evicted_oldest_first() {
        let registry = JobRegistry::new();
        let mut ids = Vec::new();
        for i in 0..RETAINED_FINISHED_JOBS + 3 {
            let job = job(&format!("t{i}"));
            ids.push(job.job_id);
            registry.insert(job).await;
        }
        let running = job("still-running");
        let running_id = running.job_id;
        registry.insert(running).await;

        for (i, id) in ids.iter().enumerate() {
            registry.complete(*id, result(&format!("t{i}"))).await;
        }

        assert_eq!(registry.len().await, RETAINED_FINISHED_JOBS + 1);
        for id in &ids[..3] {
            assert!(registry.get(*id).await.is_none());
        }
        assert!(registry.get(ids[3]).await.is_some());
        assert!(registry.get(running_id).await.is_some());
    }

    #[tokio::test]
    async fn removed_job_is_gone_and_not_evicted_twice() {
        let registry = JobRegistry::new();
        let job = job("r");
        let id = job.job_id;
        registry.insert(job).await;
        registry.complete(id, result("r")).await;

        assert_eq!(registry.remove(id).await.map(|j| j.task_id).as_deref(), Some("r"));
        assert!(registry.get(id).await.is_none());
        assert!(registry.remove(id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }
}
