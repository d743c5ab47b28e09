//! Workflow infrastructure: built-in action backends and webhook authentication.
//!
//! - `actions` -- echo/log/shell/file/HTTP executors behind `ActionRegistry`
//! - `webhook_handler` -- HMAC-SHA256 signature verification for webhook ingress

pub mod actions;
pub mod webhook_handler;
