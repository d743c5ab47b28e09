//! Infrastructure layer for Cadence.
//!
//! Contains implementations of the ports defined in `cadence-core`:
//! YAML workflow storage, config loading, the built-in action backends
//! (shell, file, HTTP), and webhook signature verification.

pub mod config;
pub mod filesystem;
pub mod workflow;
