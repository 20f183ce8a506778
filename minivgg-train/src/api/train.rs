//! POST /train: synchronous training
//!
//! Blocks the request until the job finishes and answers with the flat
//! result (hyperparameters merged as top-level keys).

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{Map, Value};

use crate::{error::ApiResult, models::TrainingRequest, AppState};

pub async fn train(
    State(state): State<AppState>,
    Json(request): Json<TrainingRequest>,
) -> ApiResult<Json<Map<String, Value>>> {
    request.validate()?;
    tracing::info!(
        task_id = %request.task_id,
        train_only = request.train_only,
        "Received training request"
    );

    let result = state.runner.run(request).await?;
    Ok(Json(result.to_flat_map()))
}

pub fn train_routes() -> Router<AppState> {
    Router::new().route("/train", post(train))
}
