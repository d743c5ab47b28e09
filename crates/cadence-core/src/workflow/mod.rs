//! Workflow engine core: definitions, triggers, and step interpretation.
//!
//! This module contains the "brain" of the engine:
//! - `definition` -- YAML/JSON parsing, validation, error taxonomy
//! - `condition` -- dotted-path lookup and the condition operator table
//! - `context` -- `{{ var }}` template resolution
//! - `cron` -- 5-field cron expression matcher
//! - `execution` -- shared per-execution state and status transitions
//! - `handlers` -- action / input / notification collaborator seams
//! - `retry` -- retry decisions and cancellation-aware backoff
//! - `script` -- sandboxed JEXL evaluation for `script` steps
//! - `step_runner` -- step interpreter for all 9 step kinds
//! - `scheduler` -- interval, cron, and condition-poll jobs
//! - `trigger` -- trigger (de)activation, event index, webhook matching
//! - `manager` -- the `WorkflowManager` facade

pub mod condition;
pub mod context;
pub mod cron;
pub mod definition;
pub mod execution;
pub mod handlers;
pub mod manager;
pub mod retry;
pub mod scheduler;
pub mod script;
pub mod step_runner;
pub mod trigger;
