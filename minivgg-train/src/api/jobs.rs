//! Asynchronous job API
//!
//! POST /jobs submits a training request and returns immediately;
//! GET /jobs/{job_id} reports progress and, once finished, the typed
//! result or the failure.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{JobState, TrainingJob, TrainingRequest},
    AppState,
};

/// POST /jobs response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub task_id: String,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
}

/// POST /jobs
///
/// Returns 202 Accepted with the job ID to poll.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<TrainingRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    request.validate()?;

    let job = state.runner.submit(request).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.job_id,
            task_id: job.task_id,
            state: job.state,
            submitted_at: job.submitted_at,
        }),
    ))
}

/// GET /jobs/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<TrainingJob>> {
    let job = state
        .runner
        .registry()
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Training job not found: {}", job_id)))?;

    tracing::debug!(job_id = %job_id, state = ?job.state, "Status query");
    Ok(Json(job))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs/:job_id", get(get_job))
}
