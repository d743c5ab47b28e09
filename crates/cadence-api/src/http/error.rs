//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use cadence_core::workflow::definition::WorkflowError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Engine errors.
    Workflow(WorkflowError),
    /// Request body or query failed validation.
    Validation(String),
    /// Nothing registered at the requested path.
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Workflow(e) => {
                let (status, code) = match e {
                    WorkflowError::WorkflowNotFound(_) => (StatusCode::NOT_FOUND, "WORKFLOW_NOT_FOUND"),
                    WorkflowError::StepNotFound { .. } => (StatusCode::NOT_FOUND, "STEP_NOT_FOUND"),
                    WorkflowError::ExecutionNotFound(_) => (StatusCode::NOT_FOUND, "EXECUTION_NOT_FOUND"),
                    WorkflowError::CapacityExceeded { .. } => {
                        (StatusCode::TOO_MANY_REQUESTS, "CAPACITY_EXCEEDED")
                    }
                    WorkflowError::InvalidExecutionState { .. } => {
                        (StatusCode::CONFLICT, "INVALID_EXECUTION_STATE")
                    }
                    WorkflowError::ValidationError(_)
                    | WorkflowError::ParseError(_)
                    | WorkflowError::InvalidCronExpression { .. } => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "WORKFLOW_ERROR"),
                };
                (status, code, e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::workflow::ExecutionStatus;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(WorkflowError::WorkflowNotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (
                AppError::from(WorkflowError::CapacityExceeded { max: 5 }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::from(WorkflowError::InvalidExecutionState {
                    execution_id: Uuid::nil(),
                    status: ExecutionStatus::Completed,
                    operation: "cancel",
                }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(WorkflowError::ValidationError("bad".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Internal("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
