//! Workflow document parsing, serialization, and validation.
//!
//! Converts between YAML/JSON documents and `Workflow`, and validates the
//! structural constraints the engine relies on (unique step ids per list,
//! well-formed triggers, loop modes with their required fields).

use std::collections::HashSet;

use cadence_types::error::RepositoryError;
use cadence_types::workflow::{ExecutionStatus, LoopType, StepConfig, TriggerConfig, Workflow, WorkflowStep};
use thiserror::Error;
use uuid::Uuid;

use super::cron::CronExpression;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by the workflow manager and document helpers.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("step '{step_id}' not found in workflow {workflow_id}")]
    StepNotFound { workflow_id: Uuid, step_id: String },

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    /// Launch-time admission rejection.
    #[error("maximum concurrent executions ({max}) reached")]
    CapacityExceeded { max: usize },

    #[error("cannot {operation} execution {execution_id} while it is {status}")]
    InvalidExecutionState {
        execution_id: Uuid,
        status: ExecutionStatus,
        operation: &'static str,
    },

    #[error("step '{step_id}' timed out after {timeout_ms}ms")]
    StepTimeout { step_id: String, timeout_ms: u64 },

    #[error("step '{step_id}' failed: {message}")]
    StepExecutionFailed { step_id: String, message: String },

    #[error("script execution is disabled")]
    ScriptExecutionDisabled,

    #[error("unsupported step type: {0}")]
    UnsupportedStepType(String),

    #[error("unsupported script language: {0}")]
    UnsupportedScriptLanguage(String),

    /// Only ever logged by the scheduler; surfaced by validation.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    /// The task driving an execution panicked or was aborted.
    #[error("execution {execution_id} aborted: {reason}")]
    ExecutionAborted { execution_id: Uuid, reason: String },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML document into a validated `Workflow`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Parse a JSON document into a validated `Workflow`.
pub fn parse_workflow_json(json: &str) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

pub fn serialize_workflow_yaml(workflow: &Workflow) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(workflow).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Give every trigger without an id a fresh one.
pub fn assign_trigger_ids(workflow: &mut Workflow) {
    for trigger in &mut workflow.triggers {
        if trigger.id.is_empty() {
            trigger.id = Uuid::now_v7().to_string();
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `Workflow`.
///
/// Checks:
/// - Name is non-empty
/// - Step ids are non-empty and unique within each step list (recursively)
/// - Action steps name an action type
/// - Loop steps carry the field their mode needs
/// - Schedule triggers have a valid cron expression or a non-zero interval
/// - Webhook triggers have a path and at least one method
/// - Event triggers have a name
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    if workflow.metadata.name.trim().is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow name must not be empty".to_string(),
        ));
    }

    for trigger in &workflow.triggers {
        validate_trigger(&trigger.config)?;
    }

    validate_steps(&workflow.steps)
}

fn validate_trigger(config: &TriggerConfig) -> Result<(), WorkflowError> {
    match config {
        TriggerConfig::Schedule {
            cron, interval_ms, ..
        } => {
            if cron.is_none() && interval_ms.is_none() {
                return Err(WorkflowError::ValidationError(
                    "schedule trigger needs a cron expression or an interval".to_string(),
                ));
            }
            if let Some(expression) = cron {
                CronExpression::parse(expression).map_err(|e| {
                    WorkflowError::InvalidCronExpression {
                        expression: expression.clone(),
                        reason: e.to_string(),
                    }
                })?;
            }
            if *interval_ms == Some(0) {
                return Err(WorkflowError::ValidationError(
                    "schedule interval must be > 0".to_string(),
                ));
            }
        }
        TriggerConfig::Webhook { path, methods, .. } => {
            if path.trim().is_empty() {
                return Err(WorkflowError::ValidationError(
                    "webhook trigger path must not be empty".to_string(),
                ));
            }
            if methods.is_empty() {
                return Err(WorkflowError::ValidationError(format!(
                    "webhook trigger '{path}' allows no methods"
                )));
            }
        }
        TriggerConfig::Event { event_name, .. } if event_name.trim().is_empty() => {
            return Err(WorkflowError::ValidationError(
                "event trigger name must not be empty".to_string(),
            ));
        }
        _ => {}
    }
    Ok(())
}

/// Validate one step list and, recursively, every list nested inside it.
pub fn validate_steps(steps: &[WorkflowStep]) -> Result<(), WorkflowError> {
    let mut seen_ids = HashSet::new();
    for step in steps {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' has an empty id",
                step.name
            )));
        }
        if !seen_ids.insert(step.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }

        match &step.config {
            StepConfig::Action { action_type, .. } if action_type.trim().is_empty() => {
                return Err(WorkflowError::ValidationError(format!(
                    "action step '{}' has no action type",
                    step.id
                )));
            }
            StepConfig::Loop {
                loop_type,
                count,
                conditions,
                items,
                ..
            } => {
                let missing = match loop_type {
                    LoopType::Count => count.is_none().then_some("count"),
                    LoopType::While => conditions.is_empty().then_some("conditions"),
                    LoopType::ForEach => items.is_none().then_some("items"),
                };
                if let Some(field) = missing {
                    return Err(WorkflowError::ValidationError(format!(
                        "loop step '{}' is missing '{field}'",
                        step.id
                    )));
                }
            }
            StepConfig::Input {
                result_variable, ..
            } if result_variable.trim().is_empty() => {
                return Err(WorkflowError::ValidationError(format!(
                    "input step '{}' has no result variable",
                    step.id
                )));
            }
            _ => {}
        }

        for nested in step.config.child_step_lists() {
            validate_steps(nested)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
metadata:
  id: 01926f4e-8c4a-7b2e-9a1d-3f5e6a7b8c9d
  name: backup
  created_at: 2026-01-05T08:00:00Z
  updated_at: 2026-01-05T08:00:00Z
triggers:
  - config:
      type: schedule
      cron: "0 3 * * *"
steps:
  - id: check
    name: Check
    config:
      type: condition
      conditions:
        - field: disk.free
          operator: greater_than
          value: 10
      then_steps:
        - id: copy
          name: Copy
          config:
            type: action
            action_type: shell
            params: { command: "rsync -a src/ dst/" }
      else_steps:
        - id: copy
          name: Warn
          config:
            type: notification
            title: Backup skipped
            message: "Only {{disk.free}}GB free"
"#;

    #[test]
    fn test_parse_valid_yaml() {
        let wf = parse_workflow_yaml(VALID).unwrap();
        assert_eq!(wf.metadata.name, "backup");
        // same id in then/else lists is fine: they are separate lists
        assert_eq!(wf.steps.len(), 1);
    }

    #[test]
    fn test_assign_trigger_ids_fills_blanks_only() {
        let mut wf = parse_workflow_yaml(VALID).unwrap();
        wf.triggers.push(cadence_types::workflow::WorkflowTrigger::manual());
        let kept = wf.triggers[1].id.clone();
        assign_trigger_ids(&mut wf);
        assert!(!wf.triggers[0].id.is_empty());
        assert_eq!(wf.triggers[1].id, kept);
    }

    #[test]
    fn test_duplicate_ids_in_nested_list_rejected() {
        let yaml = VALID.replace("id: copy\n          name: Warn", "id: warn\n          name: Warn")
            .replace(
                "      else_steps:",
                "        - id: copy\n          name: Again\n          config:\n            type: action\n            action_type: echo\n      else_steps:",
            );
        let err = parse_workflow_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate step ID: 'copy'"), "{err}");
    }

    #[test]
    fn test_bad_cron_rejected() {
        let yaml = VALID.replace("\"0 3 * * *\"", "\"0 3 * *\"");
        let err = parse_workflow_yaml(&yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidCronExpression { .. }));
    }

    #[test]
    fn test_schedule_needs_cron_or_interval() {
        let yaml = VALID.replace("      cron: \"0 3 * * *\"\n", "");
        let err = parse_workflow_yaml(&yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(_)));
    }

    #[test]
    fn test_loop_requires_mode_field() {
        let json = r#"{
            "metadata": {
                "id": "01926f4e-8c4a-7b2e-9a1d-3f5e6a7b8c9d",
                "name": "loops",
                "created_at": "2026-01-05T08:00:00Z",
                "updated_at": "2026-01-05T08:00:00Z"
            },
            "steps": [{
                "id": "each",
                "name": "Each",
                "config": {"type": "loop", "loop_type": "for_each", "steps": []}
            }]
        }"#;
        let err = parse_workflow_json(json).unwrap_err();
        assert!(err.to_string().contains("missing 'items'"), "{err}");
    }

    #[test]
    fn test_error_display() {
        let err = WorkflowError::CapacityExceeded { max: 3 };
        assert_eq!(err.to_string(), "maximum concurrent executions (3) reached");
        let err = WorkflowError::InvalidExecutionState {
            execution_id: Uuid::nil(),
            status: ExecutionStatus::Completed,
            operation: "pause",
        };
        assert!(err.to_string().contains("while it is completed"));
    }
}
