//! Lifecycle events for the Cadence event bus.
//!
//! `WorkflowEvent` is broadcast for every structural change to a workflow and
//! every execution/step transition. All variants are Clone + Send + Sync for
//! use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::TriggerType;

/// Events emitted by the workflow manager and step interpreter.
///
/// Consumed by dashboards, the CLI and anything else that wants to observe
/// the engine without affecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    // -- Definition lifecycle --
    WorkflowCreated { workflow_id: Uuid, name: String },

    WorkflowUpdated { workflow_id: Uuid, name: String },

    WorkflowDeleted { workflow_id: Uuid },

    // -- Execution lifecycle --
    ExecutionStarted {
        execution_id: Uuid,
        workflow_id: Uuid,
        trigger_type: TriggerType,
    },

    StepStarted {
        execution_id: Uuid,
        step_id: String,
        step_name: String,
        step_type: String,
    },

    StepCompleted {
        execution_id: Uuid,
        step_id: String,
        duration_ms: u64,
    },

    /// A step attempt failed. `will_retry` is false for the final attempt.
    StepFailed {
        execution_id: Uuid,
        step_id: String,
        error: String,
        will_retry: bool,
    },

    ExecutionCompleted {
        execution_id: Uuid,
        workflow_id: Uuid,
        duration_ms: u64,
    },

    ExecutionFailed {
        execution_id: Uuid,
        workflow_id: Uuid,
        error: String,
    },

    ExecutionCancelled {
        execution_id: Uuid,
        workflow_id: Uuid,
    },

    ExecutionPaused {
        execution_id: Uuid,
        workflow_id: Uuid,
    },

    ExecutionResumed {
        execution_id: Uuid,
        workflow_id: Uuid,
    },
}

impl WorkflowEvent {
    /// Returns the execution id for execution- and step-scoped events.
    pub fn execution_id(&self) -> Option<Uuid> {
        match self {
            WorkflowEvent::ExecutionStarted { execution_id, .. }
            | WorkflowEvent::StepStarted { execution_id, .. }
            | WorkflowEvent::StepCompleted { execution_id, .. }
            | WorkflowEvent::StepFailed { execution_id, .. }
            | WorkflowEvent::ExecutionCompleted { execution_id, .. }
            | WorkflowEvent::ExecutionFailed { execution_id, .. }
            | WorkflowEvent::ExecutionCancelled { execution_id, .. }
            | WorkflowEvent::ExecutionPaused { execution_id, .. }
            | WorkflowEvent::ExecutionResumed { execution_id, .. } => Some(*execution_id),

            WorkflowEvent::WorkflowCreated { .. }
            | WorkflowEvent::WorkflowUpdated { .. }
            | WorkflowEvent::WorkflowDeleted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_started_serde_tag() {
        let event = WorkflowEvent::ExecutionStarted {
            execution_id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            trigger_type: TriggerType::Webhook,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"execution_started\""));
        assert!(json.contains("\"trigger_type\":\"webhook\""));
        let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, WorkflowEvent::ExecutionStarted { .. }));
    }

    #[test]
    fn test_step_failed_carries_retry_flag() {
        let event = WorkflowEvent::StepFailed {
            execution_id: Uuid::now_v7(),
            step_id: "fetch".to_string(),
            error: "connection refused".to_string(),
            will_retry: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            WorkflowEvent::StepFailed { will_retry: true, .. }
        ));
    }

    #[test]
    fn test_execution_id_accessor() {
        let id = Uuid::now_v7();
        let event = WorkflowEvent::StepCompleted {
            execution_id: id,
            step_id: "a".to_string(),
            duration_ms: 12,
        };
        assert_eq!(event.execution_id(), Some(id));

        let created = WorkflowEvent::WorkflowCreated {
            workflow_id: Uuid::now_v7(),
            name: "w".to_string(),
        };
        assert_eq!(created.execution_id(), None);
    }
}
