//! Shared domain types for Cadence.
//!
//! This crate contains the domain types used across the Cadence workflow
//! engine: workflow definitions, execution records, lifecycle events,
//! engine configuration, and repository errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod workflow;
