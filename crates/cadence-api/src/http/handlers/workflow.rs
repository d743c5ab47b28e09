//! Workflow CRUD and execution handlers for the REST API.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use cadence_core::workflow::manager::{CreateWorkflowOptions, WorkflowUpdate};
use cadence_types::workflow::{
    TriggerType, VariableDefinition, Variables, Workflow, WorkflowExecution, WorkflowSettings,
    WorkflowStep, WorkflowTrigger,
};

use crate::http::error::AppError;
use crate::http::handlers::optional_json;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /workflows`.
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Omitted means a single manual trigger.
    #[serde(default)]
    pub triggers: Option<Vec<WorkflowTrigger>>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub input_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub output_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct DuplicateRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub inputs: Variables,
    /// Block until the execution finishes and return its record.
    #[serde(default)]
    pub wait: bool,
}

fn workflow_response(start: Instant, workflow: Workflow) -> Json<ApiResponse<Workflow>> {
    let id = workflow.metadata.id;
    Json(
        ApiResponse::since(start, workflow)
            .with_link("self", &format!("/api/v1/workflows/{id}"))
            .with_link("execute", &format!("/api/v1/workflows/{id}/execute"))
            .with_link("executions", &format!("/api/v1/executions?workflow_id={id}")),
    )
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows - Create a workflow.
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let options = CreateWorkflowOptions {
        tags: body.tags,
        author: body.author,
        triggers: body.triggers,
        steps: body.steps,
        input_variables: body.input_variables,
        output_variables: body.output_variables,
        settings: body.settings,
    };
    let workflow = state
        .manager
        .create_workflow(body.name, body.description, options)
        .await?;
    Ok(workflow_response(start, workflow))
}

/// POST /api/v1/workflows/import - Store a complete workflow document.
pub async fn import_workflow(
    State(state): State<AppState>,
    Json(body): Json<Workflow>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let workflow = state.manager.import_workflow(body).await?;
    Ok(workflow_response(start, workflow))
}

/// GET /api/v1/workflows - List all workflows.
pub async fn list_workflows(State(state): State<AppState>) -> Json<ApiResponse<Vec<Workflow>>> {
    let start = Instant::now();
    let workflows = state.manager.list_workflows().await;
    Json(ApiResponse::since(start, workflows).with_link("self", "/api/v1/workflows"))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let workflow = state.manager.get_workflow(id).await?;
    Ok(workflow_response(start, workflow))
}

/// PUT /api/v1/workflows/{id} - Merge a partial update.
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<WorkflowUpdate>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let workflow = state.manager.update_workflow(id, update).await?;
    Ok(workflow_response(start, workflow))
}

/// DELETE /api/v1/workflows/{id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    state.manager.delete_workflow(id).await?;
    Ok(Json(ApiResponse::since(
        start,
        json!({"deleted": true, "id": id.to_string()}),
    )))
}

/// POST /api/v1/workflows/{id}/duplicate
pub async fn duplicate_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let request: DuplicateRequest = optional_json(&body)?;
    let workflow = state.manager.duplicate_workflow(id, request.name).await?;
    Ok(workflow_response(start, workflow))
}

/// POST /api/v1/workflows/{id}/enable
pub async fn enable_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let workflow = state.manager.set_enabled(id, true).await?;
    Ok(workflow_response(start, workflow))
}

/// POST /api/v1/workflows/{id}/disable
pub async fn disable_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let start = Instant::now();
    let workflow = state.manager.set_enabled(id, false).await?;
    Ok(workflow_response(start, workflow))
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{id}/execute - Launch a manual execution.
///
/// Returns the launched execution's current record, or the finished record
/// when `wait` is set.
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let start = Instant::now();
    let request: ExecuteRequest = optional_json(&body)?;

    let handle = state
        .manager
        .start_workflow(id, request.inputs, TriggerType::Manual)
        .await?;
    let execution_id = handle.execution_id;
    let execution = if request.wait {
        handle.wait().await?
    } else {
        state.manager.get_execution(execution_id).await?
    };

    tracing::info!(workflow_id = %id, %execution_id, wait = request.wait, "execution launched over HTTP");
    Ok(Json(
        ApiResponse::since(start, execution)
            .with_link("self", &format!("/api/v1/executions/{execution_id}")),
    ))
}
