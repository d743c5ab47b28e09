//! Execution inspection and control handlers.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use cadence_types::workflow::WorkflowExecution;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for listing executions.
#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    /// Only executions of this workflow.
    pub workflow_id: Option<Uuid>,
    /// Maximum number of executions to return (default 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

fn execution_response(start: Instant, execution: WorkflowExecution) -> Json<ApiResponse<WorkflowExecution>> {
    let id = execution.id;
    let workflow_id = execution.workflow_id;
    Json(
        ApiResponse::since(start, execution)
            .with_link("self", &format!("/api/v1/executions/{id}"))
            .with_link("workflow", &format!("/api/v1/workflows/{workflow_id}")),
    )
}

/// GET /api/v1/executions - Retained executions, newest first.
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ListExecutionsQuery>,
) -> Json<ApiResponse<Vec<WorkflowExecution>>> {
    let start = Instant::now();
    let mut executions = state.manager.list_executions(query.workflow_id).await;
    executions.truncate(query.limit);
    Json(ApiResponse::since(start, executions).with_link("self", "/api/v1/executions"))
}

/// GET /api/v1/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let execution = state.manager.get_execution(id).await?;
    Ok(execution_response(start, execution))
}

/// POST /api/v1/executions/{id}/cancel
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let execution = state.manager.cancel_execution(id).await?;
    Ok(execution_response(start, execution))
}

/// POST /api/v1/executions/{id}/pause
pub async fn pause_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let execution = state.manager.pause_execution(id).await?;
    Ok(execution_response(start, execution))
}

/// POST /api/v1/executions/{id}/resume
pub async fn resume_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let execution = state.manager.resume_execution(id).await?;
    Ok(execution_response(start, execution))
}
