//! Workflow engine logic and repository trait definitions for Cadence.
//!
//! This crate defines the "ports" (repository traits, action/input/notify
//! handler traits) that the infrastructure and API layers implement. It
//! depends only on `cadence-types` -- never on `cadence-infra` or any
//! filesystem/network crate.

pub mod event;
pub mod repository;
pub mod workflow;
