//! Step interpreter for all 9 workflow step kinds.
//!
//! `StepRunner` walks a step list in order, dispatching each step to a
//! kind-specific handler raced against the step's timeout, and applies the
//! step's error strategy (stop / continue / retry / fallback) to failures.
//! Container steps (condition, loop, parallel) recurse into their nested
//! lists; `subworkflow` steps go back through the manager.
//!
//! Step kinds: Action, Condition, Loop, Parallel, Wait, Input, Notification,
//! Script, Subworkflow.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use cadence_types::config::EngineConfig;
use cadence_types::event::WorkflowEvent;
use cadence_types::workflow::{
    ConditionLogic, ErrorStrategy, LoopType, ParallelBranch, ParallelWait, StepConfig,
    StepExecutionResult, StepStatus, Variables, WorkflowCondition, WorkflowExecution, WorkflowStep,
};
use chrono::Utc;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use uuid::Uuid;

use super::condition::{resolve_path, ConditionEvaluator};
use super::context::{render_template, resolve_params};
use super::definition::WorkflowError;
use super::execution::ExecutionState;
use super::handlers::{ActionRequest, InputRequest, Notification, StepHandlers};
use super::retry::RetryHandler;
use super::script::ScriptEngine;
use crate::event::signal::wait_for_named;
use crate::event::{EventBus, EventSignals};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum sub-workflow nesting depth.
pub const MAX_SUB_WORKFLOW_DEPTH: u32 = 5;

/// Variable holding the zero-based loop iteration.
pub const LOOP_INDEX_VARIABLE: &str = "$index";

/// Default variable bound to the current `for_each` element.
pub const LOOP_ITEM_VARIABLE: &str = "$item";

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that can occur during step execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    #[error("step timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Failed(String),

    #[error("script execution is disabled")]
    ScriptExecutionDisabled,

    #[error("unsupported step type: {0}")]
    UnsupportedStepType(String),

    #[error("unsupported script language: {0}")]
    UnsupportedScriptLanguage(String),

    #[error("no executor registered for action type '{0}'")]
    UnsupportedActionType(String),

    #[error("sub-workflow depth {depth} exceeds maximum {max}")]
    SubWorkflowDepthExceeded { depth: u32, max: u32 },
}

impl StepError {
    /// Lift into the manager-level taxonomy for the step that raised it.
    pub fn into_workflow_error(self, step_id: &str) -> WorkflowError {
        match self {
            StepError::Timeout { timeout_ms } => WorkflowError::StepTimeout {
                step_id: step_id.to_string(),
                timeout_ms,
            },
            StepError::ScriptExecutionDisabled => WorkflowError::ScriptExecutionDisabled,
            StepError::UnsupportedStepType(kind) => WorkflowError::UnsupportedStepType(kind),
            StepError::UnsupportedScriptLanguage(lang) => {
                WorkflowError::UnsupportedScriptLanguage(lang)
            }
            other => WorkflowError::StepExecutionFailed {
                step_id: step_id.to_string(),
                message: other.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-workflow seam
// ---------------------------------------------------------------------------

/// Runs a child workflow to completion on behalf of a `subworkflow` step.
///
/// Implemented by the workflow manager; the runner only holds a weak
/// reference so the two do not keep each other alive.
pub trait SubWorkflowLauncher: Send + Sync {
    fn run_child(
        &self,
        workflow_id: Uuid,
        inputs: Variables,
        parent_execution_id: Uuid,
        depth: u32,
    ) -> BoxFuture<'_, Result<WorkflowExecution, WorkflowError>>;
}

// ---------------------------------------------------------------------------
// RunScope
// ---------------------------------------------------------------------------

/// Per-execution defaults threaded through the recursion.
#[derive(Debug, Clone, Copy)]
pub struct RunScope {
    pub default_timeout: Duration,
    pub default_strategy: ErrorStrategy,
    /// Sub-workflow nesting level (0 for top-level executions).
    pub depth: u32,
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

struct RunnerInner {
    handlers: StepHandlers,
    launcher: Weak<dyn SubWorkflowLauncher>,
    events: EventBus,
    signals: EventSignals,
    max_iterations: u64,
    condition_poll_interval: Duration,
    wait_safety_timeout: Duration,
    scripts_enabled: bool,
}

/// Executes step lists for executions. Cheap to clone.
#[derive(Clone)]
pub struct StepRunner {
    inner: Arc<RunnerInner>,
}

impl StepRunner {
    pub fn new(
        handlers: StepHandlers,
        launcher: Weak<dyn SubWorkflowLauncher>,
        events: EventBus,
        signals: EventSignals,
        config: &EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                handlers,
                launcher,
                events,
                signals,
                max_iterations: config.default_max_iterations,
                condition_poll_interval: config.condition_poll_interval(),
                wait_safety_timeout: config.wait_safety_timeout(),
                scripts_enabled: config.scripts_enabled,
            }),
        }
    }

    /// Run `steps` in order.
    ///
    /// Disabled steps are skipped. The list is abandoned as soon as the
    /// execution stops running; a paused execution holds here until resumed.
    pub fn execute_steps<'a>(
        &'a self,
        state: &'a Arc<ExecutionState>,
        steps: &'a [WorkflowStep],
        scope: RunScope,
    ) -> BoxFuture<'a, Result<(), StepError>> {
        Box::pin(async move {
            for step in steps {
                if !step.enabled {
                    tracing::debug!(step_id = %step.id, "skipping disabled step");
                    continue;
                }
                if !state.wait_until_runnable().await {
                    tracing::debug!(
                        execution_id = %state.id(),
                        status = %state.status(),
                        "execution no longer running, abandoning step list"
                    );
                    break;
                }
                self.execute_step(state, step, scope).await?;
            }
            Ok(())
        })
    }

    /// Run one step with timeout, retries, and its error strategy.
    async fn execute_step(
        &self,
        state: &Arc<ExecutionState>,
        step: &WorkflowStep,
        scope: RunScope,
    ) -> Result<(), StepError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let strategy = step.on_error.unwrap_or(scope.default_strategy);
        let timeout = step
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(scope.default_timeout);

        if strategy == ErrorStrategy::Retry && step.retry.is_none() {
            tracing::warn!(step_id = %step.id, "retry strategy without a retry policy; failures will stop");
        }

        self.inner.events.publish(WorkflowEvent::StepStarted {
            execution_id: state.id(),
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            step_type: step.config.kind_name().to_string(),
        });
        tracing::debug!(step_id = %step.id, step_type = step.config.kind_name(), "step started");

        let mut retries = 0u32;
        loop {
            let attempt = match tokio::time::timeout(timeout, self.run_kind(state, step, scope)).await {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            let err = match attempt {
                Ok(output) => {
                    state
                        .push_result(step_result(step, started_at, StepStatus::Completed, Some(output), None, retries))
                        .await;
                    self.inner.events.publish(WorkflowEvent::StepCompleted {
                        execution_id: state.id(),
                        step_id: step.id.clone(),
                        duration_ms: elapsed_ms(clock),
                    });
                    tracing::debug!(step_id = %step.id, retries, "step completed");
                    return Ok(());
                }
                Err(err) => err,
            };

            let retry_policy = RetryHandler::next_retry(strategy, step.retry.as_ref(), retries)
                .filter(|_| !state.cancellation().is_cancelled());
            self.inner.events.publish(WorkflowEvent::StepFailed {
                execution_id: state.id(),
                step_id: step.id.clone(),
                error: err.to_string(),
                will_retry: retry_policy.is_some(),
            });

            if let Some(policy) = retry_policy {
                retries += 1;
                let delay = RetryHandler::delay_for(policy, retries);
                tracing::debug!(step_id = %step.id, retry = retries, delay_ms = delay.as_millis() as u64, error = %err, "retrying step");
                if RetryHandler::backoff(delay, state.cancellation()).await {
                    continue;
                }
                tracing::debug!(step_id = %step.id, "cancelled during retry backoff");
            }

            state
                .push_result(step_result(step, started_at, StepStatus::Failed, None, Some(err.to_string()), retries))
                .await;

            return match strategy {
                ErrorStrategy::Continue => {
                    tracing::warn!(step_id = %step.id, error = %err, "step failed, continuing");
                    Ok(())
                }
                ErrorStrategy::Stop | ErrorStrategy::Retry | ErrorStrategy::Fallback => {
                    tracing::warn!(step_id = %step.id, error = %err, "step failed");
                    Err(err)
                }
            };
        }
    }

    /// Kind-specific execution of one attempt.
    async fn run_kind(
        &self,
        state: &Arc<ExecutionState>,
        step: &WorkflowStep,
        scope: RunScope,
    ) -> Result<Value, StepError> {
        match &step.config {
            StepConfig::Action {
                action_type,
                params,
                result_variable,
            } => {
                self.run_action(state, step, action_type, params, result_variable.as_deref())
                    .await
            }
            StepConfig::Condition {
                conditions,
                logic,
                then_steps,
                else_steps,
            } => {
                self.run_condition(state, conditions, *logic, then_steps, else_steps.as_deref(), scope)
                    .await
            }
            StepConfig::Loop { .. } => self.run_loop(state, &step.config, scope).await,
            StepConfig::Parallel { branches, wait_for } => {
                self.run_parallel(state, branches, *wait_for, scope).await
            }
            StepConfig::Wait {
                duration_ms,
                event_name,
                conditions,
                logic,
            } => {
                self.run_wait(state, *duration_ms, event_name.as_deref(), conditions, *logic)
                    .await
            }
            StepConfig::Input {
                prompt,
                input_type,
                default,
                result_variable,
            } => {
                self.run_input(state, step, prompt, input_type.as_deref(), default.as_ref(), result_variable)
                    .await
            }
            StepConfig::Notification {
                title,
                message,
                level,
            } => {
                let vars = state.variables().await;
                let notification = Notification {
                    execution_id: state.id(),
                    title: render_template(title, &vars),
                    message: render_template(message, &vars),
                    level: *level,
                };
                self.run_notification(notification).await
            }
            StepConfig::Script {
                language,
                code,
                input_variables,
                output_variables,
            } => {
                self.run_script(state, language, code, input_variables, output_variables)
                    .await
            }
            StepConfig::Subworkflow {
                workflow_id,
                input_mapping,
                output_mapping,
            } => {
                self.run_subworkflow(state, *workflow_id, input_mapping, output_mapping, scope)
                    .await
            }
            StepConfig::Unsupported => Err(StepError::UnsupportedStepType(format!(
                "step '{}' has an unrecognized type",
                step.id
            ))),
        }
    }

    async fn run_action(
        &self,
        state: &Arc<ExecutionState>,
        step: &WorkflowStep,
        action_type: &str,
        params: &Value,
        result_variable: Option<&str>,
    ) -> Result<Value, StepError> {
        let executor = self
            .inner
            .handlers
            .actions
            .get(action_type)
            .ok_or_else(|| StepError::UnsupportedActionType(action_type.to_string()))?;

        let vars = state.variables().await;
        let request = ActionRequest {
            execution_id: state.id(),
            step_id: step.id.clone(),
            action_type: action_type.to_string(),
            params: resolve_params(params, &vars),
        };

        // Detached so a step timeout abandons the action instead of dropping it.
        let outcome = tokio::spawn(async move { executor.execute(request).await })
            .await
            .map_err(|e| StepError::Failed(format!("action task failed: {e}")))?;

        if !outcome.success {
            return Err(StepError::Failed(
                outcome
                    .error
                    .unwrap_or_else(|| format!("action '{action_type}' failed")),
            ));
        }
        if let Some(name) = result_variable {
            state.set_variable(name, outcome.output.clone()).await;
        }
        Ok(outcome.output)
    }

    async fn run_condition(
        &self,
        state: &Arc<ExecutionState>,
        conditions: &[WorkflowCondition],
        logic: ConditionLogic,
        then_steps: &[WorkflowStep],
        else_steps: Option<&[WorkflowStep]>,
        scope: RunScope,
    ) -> Result<Value, StepError> {
        let vars = state.variables().await;
        let met = ConditionEvaluator::evaluate(conditions, logic, &vars);
        let branch = if met {
            self.execute_steps(state, then_steps, scope).await?;
            "then"
        } else if let Some(else_steps) = else_steps {
            self.execute_steps(state, else_steps, scope).await?;
            "else"
        } else {
            "none"
        };
        Ok(json!({ "condition_met": met, "branch": branch }))
    }

    async fn run_loop(
        &self,
        state: &Arc<ExecutionState>,
        config: &StepConfig,
        scope: RunScope,
    ) -> Result<Value, StepError> {
        let StepConfig::Loop {
            loop_type,
            count,
            conditions,
            logic,
            items,
            item_variable,
            max_iterations,
            steps,
        } = config
        else {
            return Err(StepError::Failed("not a loop step".to_string()));
        };
        let limit = max_iterations.unwrap_or(self.inner.max_iterations);

        let mut iterations = 0u64;
        match loop_type {
            LoopType::Count => {
                let count = count.ok_or_else(|| StepError::Failed("count loop has no count".to_string()))?;
                while iterations < count.min(limit) {
                    if !state.wait_until_runnable().await {
                        break;
                    }
                    state.set_variable(LOOP_INDEX_VARIABLE, json!(iterations)).await;
                    self.execute_steps(state, steps, scope).await?;
                    iterations += 1;
                }
            }
            LoopType::While => {
                while iterations < limit {
                    if !state.wait_until_runnable().await {
                        break;
                    }
                    let vars = state.variables().await;
                    if !ConditionEvaluator::evaluate(conditions, *logic, &vars) {
                        break;
                    }
                    state.set_variable(LOOP_INDEX_VARIABLE, json!(iterations)).await;
                    self.execute_steps(state, steps, scope).await?;
                    iterations += 1;
                }
            }
            LoopType::ForEach => {
                let path = items
                    .as_deref()
                    .ok_or_else(|| StepError::Failed("for_each loop has no items path".to_string()))?;
                let vars = state.variables().await;
                let elements = match resolve_path(&vars, path) {
                    Some(Value::Array(elements)) => elements.clone(),
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => {
                        return Err(StepError::Failed(format!(
                            "for_each items '{path}' is not an array"
                        )))
                    }
                };
                let item_name = item_variable.as_deref().unwrap_or(LOOP_ITEM_VARIABLE);
                for element in elements {
                    if iterations >= limit || !state.wait_until_runnable().await {
                        break;
                    }
                    state.set_variable(item_name, element).await;
                    state.set_variable(LOOP_INDEX_VARIABLE, json!(iterations)).await;
                    self.execute_steps(state, steps, scope).await?;
                    iterations += 1;
                }
            }
        }

        if iterations >= limit {
            tracing::warn!(limit, "loop stopped at its iteration limit");
        }
        Ok(json!({ "iterations": iterations, "limit_reached": iterations >= limit }))
    }

    async fn run_parallel(
        &self,
        state: &Arc<ExecutionState>,
        branches: &[ParallelBranch],
        wait_for: ParallelWait,
        scope: RunScope,
    ) -> Result<Value, StepError> {
        let mut names = Vec::with_capacity(branches.len());
        let mut handles = Vec::with_capacity(branches.len());
        for branch in branches {
            let runner = self.clone();
            let state = state.clone();
            let steps = branch.steps.clone();
            names.push(branch.name.clone());
            handles.push(tokio::spawn(async move {
                runner.execute_steps(&state, &steps, scope).await
            }));
        }

        match wait_for {
            ParallelWait::All => {
                let mut summary = serde_json::Map::new();
                let mut first_error = None;
                for (name, handle) in names.into_iter().zip(handles) {
                    let outcome = handle
                        .await
                        .map_err(|e| StepError::Failed(format!("branch '{name}' panicked: {e}")))
                        .and_then(|r| r);
                    match outcome {
                        Ok(()) => {
                            summary.insert(name, json!("completed"));
                        }
                        Err(err) => {
                            summary.insert(name.clone(), json!(format!("failed: {err}")));
                            first_error.get_or_insert(StepError::Failed(format!("branch '{name}' failed: {err}")));
                        }
                    }
                }
                match first_error {
                    Some(err) => Err(err),
                    None => Ok(json!({ "wait_for": "all", "branches": summary })),
                }
            }
            ParallelWait::Any => {
                if handles.is_empty() {
                    return Ok(json!({ "wait_for": "any", "winner": Value::Null }));
                }
                // The losers keep running detached.
                let (first, index, _rest) = futures_util::future::select_all(handles).await;
                let name = names[index].clone();
                first
                    .map_err(|e| StepError::Failed(format!("branch '{name}' panicked: {e}")))?
                    .map_err(|err| StepError::Failed(format!("branch '{name}' failed: {err}")))?;
                Ok(json!({ "wait_for": "any", "winner": name }))
            }
            ParallelWait::None => Ok(json!({ "wait_for": "none", "launched": handles.len() })),
        }
    }

    async fn run_wait(
        &self,
        state: &Arc<ExecutionState>,
        duration_ms: Option<u64>,
        event_name: Option<&str>,
        conditions: &[WorkflowCondition],
        logic: ConditionLogic,
    ) -> Result<Value, StepError> {
        let cancel = state.cancellation().clone();
        let clock = Instant::now();
        // Subscribe before waiting so an event fired during the delay is kept.
        let mut events = event_name.map(|_| self.inner.signals.subscribe());
        let mut output = serde_json::Map::new();

        if let Some(ms) = duration_ms {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                _ = cancel.cancelled() => {
                    output.insert("cancelled".to_string(), json!(true));
                }
            }
        }

        if let (Some(name), Some(rx)) = (event_name, events.as_mut()) {
            if !cancel.is_cancelled() {
                let received = tokio::select! {
                    data = wait_for_named(rx, name, self.inner.wait_safety_timeout) => data,
                    _ = cancel.cancelled() => None,
                };
                output.insert("event_received".to_string(), json!(received.is_some()));
                output.insert("event".to_string(), received.unwrap_or(Value::Null));
            }
        }

        if !conditions.is_empty() && !cancel.is_cancelled() {
            let deadline = Instant::now() + self.inner.wait_safety_timeout;
            let met = loop {
                if ConditionEvaluator::evaluate(conditions, logic, &state.variables().await) {
                    break true;
                }
                if Instant::now() >= deadline {
                    break false;
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.inner.condition_poll_interval) => {}
                    _ = cancel.cancelled() => break false,
                }
            };
            output.insert("condition_met".to_string(), json!(met));
        }

        output.insert("waited_ms".to_string(), json!(elapsed_ms(clock)));
        Ok(Value::Object(output))
    }

    async fn run_input(
        &self,
        state: &Arc<ExecutionState>,
        step: &WorkflowStep,
        prompt: &str,
        input_type: Option<&str>,
        default: Option<&Value>,
        result_variable: &str,
    ) -> Result<Value, StepError> {
        let value = match &self.inner.handlers.input {
            Some(handler) => {
                let vars = state.variables().await;
                let request = InputRequest {
                    execution_id: state.id(),
                    step_id: step.id.clone(),
                    prompt: render_template(prompt, &vars),
                    input_type: input_type.map(str::to_string),
                    default: default.cloned(),
                };
                handler
                    .request_input(request)
                    .await
                    .map_err(|e| StepError::Failed(format!("input request failed: {e}")))?
            }
            None => default.cloned().ok_or_else(|| {
                StepError::Failed("no input handler configured and no default value".to_string())
            })?,
        };
        state.set_variable(result_variable, value.clone()).await;
        Ok(value)
    }

    async fn run_notification(&self, notification: Notification) -> Result<Value, StepError> {
        let output = json!({
            "title": notification.title,
            "message": notification.message,
            "level": notification.level,
        });
        match &self.inner.handlers.notifier {
            Some(notifier) => notifier
                .notify(notification)
                .await
                .map_err(|e| StepError::Failed(format!("notification failed: {e}")))?,
            None => tracing::info!(
                title = %notification.title,
                message = %notification.message,
                "notification"
            ),
        }
        Ok(output)
    }

    async fn run_script(
        &self,
        state: &Arc<ExecutionState>,
        language: &str,
        code: &str,
        input_variables: &[String],
        output_variables: &[String],
    ) -> Result<Value, StepError> {
        if !self.inner.scripts_enabled {
            return Err(StepError::ScriptExecutionDisabled);
        }
        let vars = state.variables().await;
        let inputs: Variables = input_variables
            .iter()
            .map(|name| (name.clone(), vars.get(name).cloned().unwrap_or(Value::Null)))
            .collect();

        let result = ScriptEngine::new().run(language, code, &inputs)?;
        for (name, value) in ScriptEngine::map_outputs(&result, output_variables) {
            state.set_variable(name, value).await;
        }
        Ok(result)
    }

    async fn run_subworkflow(
        &self,
        state: &Arc<ExecutionState>,
        workflow_id: Uuid,
        input_mapping: &std::collections::BTreeMap<String, String>,
        output_mapping: &std::collections::BTreeMap<String, String>,
        scope: RunScope,
    ) -> Result<Value, StepError> {
        let depth = scope.depth + 1;
        if depth > MAX_SUB_WORKFLOW_DEPTH {
            return Err(StepError::SubWorkflowDepthExceeded {
                depth,
                max: MAX_SUB_WORKFLOW_DEPTH,
            });
        }
        let launcher = self
            .inner
            .launcher
            .upgrade()
            .ok_or_else(|| StepError::Failed("workflow manager is shut down".to_string()))?;

        let vars = state.variables().await;
        let inputs: Variables = input_mapping
            .iter()
            .filter_map(|(child, path)| resolve_path(&vars, path).map(|v| (child.clone(), v.clone())))
            .collect();

        let child = launcher
            .run_child(workflow_id, inputs, state.id(), depth)
            .await
            .map_err(|e| StepError::Failed(format!("sub-workflow {workflow_id}: {e}")))?;

        if child.status != cadence_types::workflow::ExecutionStatus::Completed {
            return Err(StepError::Failed(format!(
                "sub-workflow {workflow_id} {}: {}",
                child.status,
                child.error.as_deref().unwrap_or("no error recorded")
            )));
        }

        for (parent_var, child_path) in output_mapping {
            if let Some(value) = resolve_path(&child.variables, child_path) {
                state.set_variable(parent_var.clone(), value.clone()).await;
            }
        }

        Ok(json!({
            "execution_id": child.id,
            "status": child.status,
            "outputs": child.outputs,
        }))
    }
}

fn step_result(
    step: &WorkflowStep,
    started_at: chrono::DateTime<Utc>,
    status: StepStatus,
    output: Option<Value>,
    error: Option<String>,
    retry_count: u32,
) -> StepExecutionResult {
    StepExecutionResult {
        step_id: step.id.clone(),
        step_name: step.name.clone(),
        step_type: step.config.kind_name().to_string(),
        status,
        started_at,
        completed_at: Utc::now(),
        output,
        error,
        retry_count,
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
