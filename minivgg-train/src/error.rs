//! HTTP error type for minivgg-train
//!
//! Every error body has the shape
//! `{"error": {"code", "kind", "stage", "message"}}`; `stage` is only present
//! for failures raised while a training job was running.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::JobFailure;
use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown resource (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A training run failed at a known stage
    #[error("{}", .0.message)]
    JobFailed(JobFailure),

    /// Pipeline error raised outside a running job
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<JobFailure> for ApiError {
    fn from(failure: JobFailure) -> Self {
        ApiError::JobFailed(failure)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                error_body("NOT_FOUND", "NotFound", None, msg),
            ),
            ApiError::JobFailed(failure) => {
                let status = if failure.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                let stage = serde_json::to_value(failure.stage).ok();
                (
                    status,
                    error_body(&failure.code, &failure.kind, stage, failure.message),
                )
            }
            ApiError::Pipeline(err) => {
                let status = if err.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (
                    status,
                    error_body(err.code(), err.kind(), None, err.to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(code: &str, kind: &str, stage: Option<Value>, message: String) -> Value {
    let mut error = json!({
        "code": code,
        "kind": kind,
        "message": message,
    });
    if let (Some(stage), Some(fields)) = (stage, error.as_object_mut()) {
        fields.insert("stage".to_string(), stage);
    }
    json!({ "error": error })
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
