//! minivgg-train library interface
//!
//! Trains MiniVGGNet image classifiers from directory-labeled datasets and
//! serves training over HTTP.

pub mod api;
pub mod error;
pub mod model;
pub mod models;
pub mod pipeline;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::pipeline::TrainingPipeline;
use crate::services::{JobRegistry, JobRunner};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: JobRunner,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: TrainingPipeline) -> Self {
        Self {
            runner: JobRunner::new(Arc::new(pipeline), JobRegistry::new()),
            startup_time: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::train_routes())
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
