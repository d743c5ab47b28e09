//! Webhook receiver.
//!
//! Any method on `/hooks/{*path}` is matched against enabled webhook
//! triggers. Triggers carrying a secret only launch when the request has a
//! valid `X-Cadence-Signature` over the raw body.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::Json;
use serde_json::Value;

use cadence_core::workflow::manager::TriggerOutcome;
use cadence_infra::workflow::webhook_handler::{authorize_target, SIGNATURE_HEADER};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Decode a webhook body: JSON when it parses, UTF-8 text otherwise,
/// null when empty or binary.
pub fn decode_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|_| match std::str::from_utf8(body) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Null,
    })
}

/// ANY /hooks/{*path}
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Vec<TriggerOutcome>>>, AppError> {
    let start = Instant::now();
    let webhook_path = format!("/{}", path.trim_start_matches('/'));
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcomes = state
        .manager
        .trigger_webhook_with(&webhook_path, method.as_str(), decode_body(&body), |target| {
            authorize_target(target, &body, signature)
        })
        .await;

    if outcomes.is_empty() {
        return Err(AppError::NotFound(format!(
            "no webhook registered for {method} {webhook_path}"
        )));
    }
    Ok(Json(ApiResponse::since(start, outcomes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"ref":"main"}"#), json!({"ref": "main"}));
        assert_eq!(decode_body(b"plain text"), json!("plain text"));
        assert_eq!(decode_body(&[0xff, 0xfe]), Value::Null);
    }
}
