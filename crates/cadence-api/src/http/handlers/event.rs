//! Named event ingress.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use cadence_core::workflow::manager::TriggerOutcome;

use crate::http::error::AppError;
use crate::http::handlers::optional_json;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/events/{name} - Fire an event with an optional JSON payload.
///
/// Wakes event waits and launches every listening workflow whose filter
/// accepts the payload. Launches run in the background.
pub async fn fire_event(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<Vec<TriggerOutcome>>>, AppError> {
    let start = Instant::now();
    let payload: Value = optional_json(&body)?;
    let outcomes = state.manager.trigger_event(&name, payload).await;
    Ok(Json(ApiResponse::since(start, outcomes)))
}
