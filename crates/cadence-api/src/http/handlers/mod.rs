//! Request handlers for the REST API.

pub mod event;
pub mod execution;
pub mod webhook;
pub mod workflow;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::http::error::AppError;

/// Parse an optional JSON body: an empty body yields `T::default()`.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))
}
