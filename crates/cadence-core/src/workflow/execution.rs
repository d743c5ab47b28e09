//! Shared state of one running execution.
//!
//! The record (status, variable bag, step results) sits behind a
//! `tokio::sync::RwLock`, so writes from parallel branches are serialized.
//! Status changes are mirrored into a `watch` channel that step boundaries
//! wait on while paused, and cancellation also fires a `CancellationToken`
//! for suspension points that can give up early (waits, retry backoff).
//!
//! Once the record reaches a terminal status it is frozen: later variable
//! writes and step results (e.g. from detached `any`/`none` branches) are
//! dropped.

use cadence_types::workflow::{
    ExecutionStatus, StepExecutionResult, Variables, WorkflowExecution,
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct ExecutionState {
    id: Uuid,
    workflow_id: Uuid,
    record: RwLock<WorkflowExecution>,
    status_tx: watch::Sender<ExecutionStatus>,
    cancel: CancellationToken,
}

impl ExecutionState {
    pub fn new(record: WorkflowExecution) -> Self {
        let (status_tx, _) = watch::channel(record.status);
        Self {
            id: record.id,
            workflow_id: record.workflow_id,
            record: RwLock::new(record),
            status_tx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    pub fn status(&self) -> ExecutionStatus {
        *self.status_tx.borrow()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Clone of the full record.
    pub async fn snapshot(&self) -> WorkflowExecution {
        self.record.read().await.clone()
    }

    /// Clone of the variable bag.
    pub async fn variables(&self) -> Variables {
        self.record.read().await.variables.clone()
    }

    pub async fn set_variable(&self, name: impl Into<String>, value: Value) {
        let mut record = self.record.write().await;
        if record.status.is_terminal() {
            return;
        }
        record.variables.insert(name.into(), value);
    }

    pub async fn push_result(&self, result: StepExecutionResult) {
        let mut record = self.record.write().await;
        if record.status.is_terminal() {
            tracing::debug!(execution_id = %self.id, step_id = %result.step_id, "dropping step result after execution finished");
            return;
        }
        record.step_results.push(result);
    }

    /// Move to `to` if the current status is one of `from`.
    ///
    /// Returns the status observed when the transition is refused.
    pub async fn transition(
        &self,
        from: &[ExecutionStatus],
        to: ExecutionStatus,
    ) -> Result<(), ExecutionStatus> {
        let mut record = self.record.write().await;
        if !from.contains(&record.status) {
            return Err(record.status);
        }
        record.status = to;
        if to.is_terminal() {
            record.completed_at = Some(Utc::now());
        }
        self.status_tx.send_replace(to);
        if to == ExecutionStatus::Cancelled {
            self.cancel.cancel();
        }
        Ok(())
    }

    /// Running -> Completed, recording the declared outputs.
    pub async fn complete(&self, outputs: Variables) -> bool {
        let mut record = self.record.write().await;
        if record.status != ExecutionStatus::Running {
            return false;
        }
        record.outputs = outputs;
        record.status = ExecutionStatus::Completed;
        record.completed_at = Some(Utc::now());
        self.status_tx.send_replace(ExecutionStatus::Completed);
        true
    }

    /// Running/Paused -> Failed with `error`.
    pub async fn fail(&self, error: String) -> bool {
        let mut record = self.record.write().await;
        if !record.status.is_active() {
            return false;
        }
        record.error = Some(error);
        record.status = ExecutionStatus::Failed;
        record.completed_at = Some(Utc::now());
        self.status_tx.send_replace(ExecutionStatus::Failed);
        true
    }

    /// Block while paused.
    ///
    /// Returns `true` once the execution is running, `false` if it is in any
    /// other state (cancelled, failed, ...).
    pub async fn wait_until_runnable(&self) -> bool {
        let mut rx = self.status_tx.subscribe();
        match rx.wait_for(|status| *status != ExecutionStatus::Paused).await {
            Ok(status) => *status == ExecutionStatus::Running,
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionState")
            .field("id", &self.id)
            .field("workflow_id", &self.workflow_id)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::workflow::TriggerType;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(status: ExecutionStatus) -> WorkflowExecution {
        WorkflowExecution {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            workflow_name: "w".to_string(),
            workflow_version: "1.0.0".to_string(),
            trigger_type: TriggerType::Manual,
            status,
            started_at: Utc::now(),
            completed_at: None,
            inputs: Variables::new(),
            outputs: Variables::new(),
            variables: Variables::new(),
            step_results: Vec::new(),
            error: None,
            parent_execution_id: None,
        }
    }

    #[tokio::test]
    async fn test_cancel_fires_token_and_sets_end_time() {
        let state = ExecutionState::new(record(ExecutionStatus::Running));
        state
            .transition(
                &[ExecutionStatus::Running, ExecutionStatus::Paused],
                ExecutionStatus::Cancelled,
            )
            .await
            .unwrap();
        assert!(state.cancellation().is_cancelled());
        assert_eq!(state.status(), ExecutionStatus::Cancelled);
        assert!(state.snapshot().await.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_refused_transition_reports_current_status() {
        let state = ExecutionState::new(record(ExecutionStatus::Running));
        let err = state
            .transition(&[ExecutionStatus::Paused], ExecutionStatus::Running)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn test_terminal_record_is_frozen() {
        let state = ExecutionState::new(record(ExecutionStatus::Running));
        state.set_variable("a", json!(1)).await;
        assert!(state.complete(Variables::new()).await);

        state.set_variable("b", json!(2)).await;
        assert!(!state.fail("late".to_string()).await);

        let snap = state.snapshot().await;
        assert_eq!(snap.status, ExecutionStatus::Completed);
        assert_eq!(snap.variables.get("a"), Some(&json!(1)));
        assert!(snap.variables.get("b").is_none());
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_paused_execution_waits_for_resume() {
        let state = Arc::new(ExecutionState::new(record(ExecutionStatus::Paused)));
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_until_runnable().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        state
            .transition(&[ExecutionStatus::Paused], ExecutionStatus::Running)
            .await
            .unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_while_paused_releases_waiter() {
        let state = Arc::new(ExecutionState::new(record(ExecutionStatus::Paused)));
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_until_runnable().await })
        };
        state
            .transition(&[ExecutionStatus::Paused], ExecutionStatus::Cancelled)
            .await
            .unwrap();
        assert!(!waiter.await.unwrap());
    }
}
