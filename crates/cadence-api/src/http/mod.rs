//! HTTP/REST API layer for Cadence.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format,
//! CORS support, and webhook ingress under `/hooks/`.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
