//! Axum router configuration with middleware.
//!
//! Management routes live under `/api/v1/`, webhook ingress under
//! `/hooks/`. Middleware: CORS, tracing.

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Workflow CRUD
        .route(
            "/workflows",
            post(handlers::workflow::create_workflow).get(handlers::workflow::list_workflows),
        )
        .route("/workflows/import", post(handlers::workflow::import_workflow))
        .route(
            "/workflows/{id}",
            get(handlers::workflow::get_workflow)
                .put(handlers::workflow::update_workflow)
                .delete(handlers::workflow::delete_workflow),
        )
        .route(
            "/workflows/{id}/duplicate",
            post(handlers::workflow::duplicate_workflow),
        )
        .route("/workflows/{id}/enable", post(handlers::workflow::enable_workflow))
        .route("/workflows/{id}/disable", post(handlers::workflow::disable_workflow))
        .route("/workflows/{id}/execute", post(handlers::workflow::execute_workflow))
        // Executions
        .route("/executions", get(handlers::execution::list_executions))
        .route("/executions/{id}", get(handlers::execution::get_execution))
        .route(
            "/executions/{id}/cancel",
            post(handlers::execution::cancel_execution),
        )
        .route(
            "/executions/{id}/pause",
            post(handlers::execution::pause_execution),
        )
        .route(
            "/executions/{id}/resume",
            post(handlers::execution::resume_execution),
        )
        // Events
        .route("/events/{name}", post(handlers::event::fire_event));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/hooks/{*path}", any(handlers::webhook::receive_webhook))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
