//! Workflow manager: the facade the CLI and HTTP layers talk to.
//!
//! Owns the in-memory workflow store (kept in sync with a
//! [`WorkflowRepository`]), the execution table, and the trigger subsystem.
//! Every structural change goes through one mutation lock so that
//! persistence and trigger rescheduling never interleave.
//!
//! Executions are admitted under the execution-table write lock, which is
//! what makes the concurrency cap exact under concurrent launches.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cadence_types::config::EngineConfig;
use cadence_types::event::WorkflowEvent;
use cadence_types::workflow::{
    ExecutionStatus, StepStatus, TriggerConfig, TriggerType, VariableDefinition, Variables, Workflow,
    WorkflowExecution, WorkflowMetadata, WorkflowSettings, WorkflowStep, WorkflowTrigger,
};
use chrono::Utc;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::definition::{assign_trigger_ids, validate_workflow, WorkflowError};
use super::execution::ExecutionState;
use super::handlers::StepHandlers;
use super::step_runner::{RunScope, StepRunner, SubWorkflowLauncher};
use super::trigger::{
    event_filter_matches, find_webhook_targets, TriggerFire, TriggerManager, WebhookTarget,
};
use crate::event::{EventBus, EventSignals};
use crate::repository::workflow::WorkflowRepository;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Optional fields for `create_workflow`.
#[derive(Debug, Clone, Default)]
pub struct CreateWorkflowOptions {
    pub tags: Vec<String>,
    pub author: Option<String>,
    /// Defaults to a single manual trigger.
    pub triggers: Option<Vec<WorkflowTrigger>>,
    pub steps: Vec<WorkflowStep>,
    pub input_variables: Vec<VariableDefinition>,
    pub output_variables: Vec<VariableDefinition>,
    pub settings: WorkflowSettings,
}

/// Partial update merged by `update_workflow`. `None` leaves a field alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub tags: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub triggers: Option<Vec<WorkflowTrigger>>,
    pub steps: Option<Vec<WorkflowStep>>,
    pub input_variables: Option<Vec<VariableDefinition>>,
    pub output_variables: Option<Vec<VariableDefinition>>,
    pub settings: Option<WorkflowSettings>,
}

impl WorkflowUpdate {
    fn apply(self, workflow: &mut Workflow) {
        let meta = &mut workflow.metadata;
        if let Some(name) = self.name {
            meta.name = name;
        }
        if let Some(description) = self.description {
            meta.description = Some(description);
        }
        if let Some(version) = self.version {
            meta.version = version;
        }
        if let Some(tags) = self.tags {
            meta.tags = tags;
        }
        if let Some(enabled) = self.enabled {
            meta.enabled = enabled;
        }
        if let Some(triggers) = self.triggers {
            workflow.triggers = triggers;
        }
        if let Some(steps) = self.steps {
            workflow.steps = steps;
        }
        if let Some(vars) = self.input_variables {
            workflow.input_variables = vars;
        }
        if let Some(vars) = self.output_variables {
            workflow.output_variables = vars;
        }
        if let Some(settings) = self.settings {
            workflow.settings = settings;
        }
    }
}

/// What happened to one workflow when an event or webhook fired.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub workflow_id: Uuid,
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerOutcome {
    fn from_launch(workflow_id: Uuid, launch: Result<ExecutionHandle, WorkflowError>) -> Self {
        match launch {
            Ok(handle) => Self {
                workflow_id,
                executed: true,
                execution_id: Some(handle.execution_id),
                error: None,
            },
            Err(e) => Self {
                workflow_id,
                executed: false,
                execution_id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// A launched execution running on its own task.
#[derive(Debug)]
pub struct ExecutionHandle {
    pub execution_id: Uuid,
    join: JoinHandle<WorkflowExecution>,
}

impl ExecutionHandle {
    /// Wait for the execution to reach a terminal state.
    pub async fn wait(self) -> Result<WorkflowExecution, WorkflowError> {
        self.join.await.map_err(|e| WorkflowError::ExecutionAborted {
            execution_id: self.execution_id,
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Execution table
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ExecutionTable {
    states: HashMap<Uuid, Arc<ExecutionState>>,
    /// Sub-workflow executions; exempt from admission.
    children: HashSet<Uuid>,
    /// Finished executions, oldest first, for history pruning.
    finished: VecDeque<Uuid>,
}

impl ExecutionTable {
    /// Top-level executions currently pending or running. Paused ones do
    /// not hold a slot.
    fn occupied(&self) -> usize {
        self.states
            .iter()
            .filter(|(id, state)| {
                !self.children.contains(id)
                    && matches!(state.status(), ExecutionStatus::Pending | ExecutionStatus::Running)
            })
            .count()
    }

    fn insert(&mut self, state: Arc<ExecutionState>, child: bool) {
        if child {
            self.children.insert(state.id());
        }
        self.states.insert(state.id(), state);
    }

    fn finish(&mut self, execution_id: Uuid, keep: usize) {
        self.finished.push_back(execution_id);
        while self.finished.len() > keep {
            if let Some(old) = self.finished.pop_front() {
                self.states.remove(&old);
                self.children.remove(&old);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowManager
// ---------------------------------------------------------------------------

struct ManagerInner<R: WorkflowRepository + 'static> {
    repo: R,
    config: EngineConfig,
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    executions: RwLock<ExecutionTable>,
    /// Serializes CRUD with trigger rescheduling.
    mutation: Mutex<()>,
    triggers: TriggerManager,
    events: EventBus,
    runner: StepRunner,
    this: Weak<ManagerInner<R>>,
}

/// Handle to the workflow engine. Cheap to clone.
pub struct WorkflowManager<R: WorkflowRepository + 'static> {
    inner: Arc<ManagerInner<R>>,
}

impl<R: WorkflowRepository + 'static> Clone for WorkflowManager<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: WorkflowRepository + 'static> WorkflowManager<R> {
    pub fn new(repo: R, config: EngineConfig, handlers: StepHandlers) -> Self {
        let events = EventBus::new(config.event_channel_capacity);
        let signals = EventSignals::new(config.event_channel_capacity);

        let inner = Arc::new_cyclic(|this: &Weak<ManagerInner<R>>| {
            let launcher: Weak<dyn SubWorkflowLauncher> = this.clone();
            let runner = StepRunner::new(handlers, launcher, events.clone(), signals.clone(), &config);
            ManagerInner {
                repo,
                triggers: TriggerManager::new(signals, config.condition_trigger_interval()),
                events,
                runner,
                workflows: RwLock::new(HashMap::new()),
                executions: RwLock::new(ExecutionTable::default()),
                mutation: Mutex::new(()),
                config,
                this: this.clone(),
            }
        });
        Self { inner }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Enable or disable schedule and condition timers for workflows armed
    /// from now on. One-shot hosts (a CLI `run`) switch them off before
    /// loading so that no background launches race the foreground one.
    pub fn set_timers_enabled(&self, enabled: bool) {
        self.inner.triggers.set_timers_enabled(enabled);
    }

    /// Lifecycle event stream. Each subscriber sees every event published
    /// after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------------

    /// Load every stored workflow and arm its triggers.
    pub async fn load_all_workflows(&self) -> Result<usize, WorkflowError> {
        let _guard = self.inner.mutation.lock().await;
        let loaded = self.inner.repo.load_all().await?;

        let mut count = 0;
        for mut workflow in loaded {
            let id = workflow.metadata.id;
            if workflow.triggers.iter().any(|t| t.id.is_empty()) {
                assign_trigger_ids(&mut workflow);
                self.inner.repo.save(&workflow).await?;
            }
            if let Err(e) = validate_workflow(&workflow) {
                tracing::warn!(workflow_id = %id, error = %e, "loaded workflow fails validation");
            }
            self.inner.workflows.write().await.insert(id, workflow.clone());
            self.inner.reschedule(&workflow);
            count += 1;
        }

        tracing::info!(count, "workflows loaded");
        Ok(count)
    }

    pub async fn create_workflow(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        options: CreateWorkflowOptions,
    ) -> Result<Workflow, WorkflowError> {
        let now = Utc::now();
        let workflow = Workflow {
            metadata: WorkflowMetadata {
                id: Uuid::now_v7(),
                name: name.into(),
                description,
                version: "1.0.0".to_string(),
                tags: options.tags,
                author: options.author,
                created_at: now,
                updated_at: now,
                enabled: true,
                is_system: false,
                is_template: false,
            },
            triggers: options
                .triggers
                .unwrap_or_else(|| vec![WorkflowTrigger::manual()]),
            steps: options.steps,
            input_variables: options.input_variables,
            output_variables: options.output_variables,
            settings: options.settings,
        };
        self.insert_new(workflow).await
    }

    /// Store a workflow document. A colliding id is replaced by a fresh one.
    pub async fn import_workflow(&self, mut workflow: Workflow) -> Result<Workflow, WorkflowError> {
        if self.inner.workflows.read().await.contains_key(&workflow.metadata.id) {
            workflow.metadata.id = Uuid::now_v7();
        }
        workflow.metadata.updated_at = Utc::now();
        self.insert_new(workflow).await
    }

    /// Deep-copy a workflow under a new id, clearing system/template flags.
    pub async fn duplicate_workflow(
        &self,
        id: Uuid,
        new_name: Option<String>,
    ) -> Result<Workflow, WorkflowError> {
        let mut copy = self.get_workflow(id).await?;
        let now = Utc::now();
        copy.metadata.id = Uuid::now_v7();
        copy.metadata.name = new_name.unwrap_or_else(|| format!("{} (copy)", copy.metadata.name));
        copy.metadata.created_at = now;
        copy.metadata.updated_at = now;
        copy.metadata.is_system = false;
        copy.metadata.is_template = false;
        self.insert_new(copy).await
    }

    async fn insert_new(&self, mut workflow: Workflow) -> Result<Workflow, WorkflowError> {
        assign_trigger_ids(&mut workflow);
        validate_workflow(&workflow)?;

        let _guard = self.inner.mutation.lock().await;
        self.inner.repo.save(&workflow).await?;
        self.inner
            .workflows
            .write()
            .await
            .insert(workflow.metadata.id, workflow.clone());
        self.inner.reschedule(&workflow);

        self.inner.events.publish(WorkflowEvent::WorkflowCreated {
            workflow_id: workflow.metadata.id,
            name: workflow.metadata.name.clone(),
        });
        tracing::info!(workflow_id = %workflow.metadata.id, name = %workflow.metadata.name, "workflow created");
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<Workflow, WorkflowError> {
        self.inner
            .workflows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WorkflowError::WorkflowNotFound(id))
    }

    /// All workflows, by name.
    pub async fn list_workflows(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self.inner.workflows.read().await.values().cloned().collect();
        workflows.sort_by(|a, b| {
            a.metadata
                .name
                .cmp(&b.metadata.name)
                .then(a.metadata.created_at.cmp(&b.metadata.created_at))
        });
        workflows
    }

    pub async fn update_workflow(&self, id: Uuid, update: WorkflowUpdate) -> Result<Workflow, WorkflowError> {
        self.modify(id, move |workflow| {
            update.apply(workflow);
            Ok(())
        })
        .await
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Workflow, WorkflowError> {
        self.update_workflow(
            id,
            WorkflowUpdate {
                enabled: Some(enabled),
                ..WorkflowUpdate::default()
            },
        )
        .await
    }

    /// Insert `step` at `index` (appended when `None` or out of range).
    pub async fn add_step(
        &self,
        id: Uuid,
        step: WorkflowStep,
        index: Option<usize>,
    ) -> Result<Workflow, WorkflowError> {
        self.modify(id, move |workflow| {
            let at = index.unwrap_or(workflow.steps.len()).min(workflow.steps.len());
            workflow.steps.insert(at, step);
            Ok(())
        })
        .await
    }

    pub async fn remove_step(&self, id: Uuid, step_id: &str) -> Result<Workflow, WorkflowError> {
        let step_id = step_id.to_string();
        self.modify(id, move |workflow| {
            let at = step_index(workflow, &step_id)?;
            workflow.steps.remove(at);
            Ok(())
        })
        .await
    }

    /// Replace a step's content. Its id never changes.
    pub async fn update_step(
        &self,
        id: Uuid,
        step_id: &str,
        mut step: WorkflowStep,
    ) -> Result<Workflow, WorkflowError> {
        let step_id = step_id.to_string();
        self.modify(id, move |workflow| {
            let at = step_index(workflow, &step_id)?;
            step.id = step_id;
            workflow.steps[at] = step;
            Ok(())
        })
        .await
    }

    /// Move a step to `new_index` (clamped to the list).
    pub async fn move_step(&self, id: Uuid, step_id: &str, new_index: usize) -> Result<Workflow, WorkflowError> {
        let step_id = step_id.to_string();
        self.modify(id, move |workflow| {
            let from = step_index(workflow, &step_id)?;
            let step = workflow.steps.remove(from);
            let to = new_index.min(workflow.steps.len());
            workflow.steps.insert(to, step);
            Ok(())
        })
        .await
    }

    /// Edit, validate, persist, and reschedule one workflow.
    async fn modify<F>(&self, id: Uuid, edit: F) -> Result<Workflow, WorkflowError>
    where
        F: FnOnce(&mut Workflow) -> Result<(), WorkflowError> + Send,
    {
        let _guard = self.inner.mutation.lock().await;
        let mut workflow = self.get_workflow(id).await?;
        edit(&mut workflow)?;
        workflow.metadata.id = id;
        workflow.metadata.updated_at = Utc::now();
        assign_trigger_ids(&mut workflow);
        validate_workflow(&workflow)?;

        self.inner.repo.save(&workflow).await?;
        self.inner.workflows.write().await.insert(id, workflow.clone());
        self.inner.reschedule(&workflow);

        self.inner.events.publish(WorkflowEvent::WorkflowUpdated {
            workflow_id: id,
            name: workflow.metadata.name.clone(),
        });
        tracing::info!(workflow_id = %id, "workflow updated");
        Ok(workflow)
    }

    /// Tear down a workflow's jobs, file, and store entry.
    pub async fn delete_workflow(&self, id: Uuid) -> Result<Workflow, WorkflowError> {
        let _guard = self.inner.mutation.lock().await;
        let workflow = self.get_workflow(id).await?;

        self.inner.triggers.deactivate(id);
        self.inner.repo.delete(&id).await?;
        self.inner.workflows.write().await.remove(&id);

        self.inner
            .events
            .publish(WorkflowEvent::WorkflowDeleted { workflow_id: id });
        tracing::info!(workflow_id = %id, "workflow deleted");
        Ok(workflow)
    }

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Run a workflow manually and wait for it to finish.
    pub async fn execute_workflow(&self, id: Uuid, inputs: Variables) -> Result<WorkflowExecution, WorkflowError> {
        self.start_workflow(id, inputs, TriggerType::Manual).await?.wait().await
    }

    /// Admit and launch an execution on its own task.
    pub async fn start_workflow(
        &self,
        id: Uuid,
        inputs: Variables,
        trigger_type: TriggerType,
    ) -> Result<ExecutionHandle, WorkflowError> {
        self.inner.clone().start(id, inputs, trigger_type).await
    }

    pub async fn get_execution(&self, execution_id: Uuid) -> Result<WorkflowExecution, WorkflowError> {
        Ok(self.inner.state(execution_id).await?.snapshot().await)
    }

    /// Retained executions, newest first.
    pub async fn list_executions(&self, workflow_id: Option<Uuid>) -> Vec<WorkflowExecution> {
        let states: Vec<Arc<ExecutionState>> = self
            .inner
            .executions
            .read()
            .await
            .states
            .values()
            .filter(|s| workflow_id.is_none_or(|id| s.workflow_id() == id))
            .cloned()
            .collect();

        let mut records = Vec::with_capacity(states.len());
        for state in states {
            records.push(state.snapshot().await);
        }
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    /// Running/Paused -> Cancelled. Observed at the next step boundary.
    pub async fn cancel_execution(&self, execution_id: Uuid) -> Result<WorkflowExecution, WorkflowError> {
        let state = self.inner.state(execution_id).await?;
        self.inner
            .cancel(&state)
            .await
            .map_err(|status| WorkflowError::InvalidExecutionState {
                execution_id,
                status,
                operation: "cancel",
            })?;
        Ok(state.snapshot().await)
    }

    pub async fn pause_execution(&self, execution_id: Uuid) -> Result<WorkflowExecution, WorkflowError> {
        let state = self.inner.state(execution_id).await?;
        state
            .transition(&[ExecutionStatus::Running], ExecutionStatus::Paused)
            .await
            .map_err(|status| WorkflowError::InvalidExecutionState {
                execution_id,
                status,
                operation: "pause",
            })?;
        self.inner.events.publish(WorkflowEvent::ExecutionPaused {
            execution_id,
            workflow_id: state.workflow_id(),
        });
        tracing::info!(%execution_id, "execution paused");
        Ok(state.snapshot().await)
    }

    pub async fn resume_execution(&self, execution_id: Uuid) -> Result<WorkflowExecution, WorkflowError> {
        let state = self.inner.state(execution_id).await?;
        state
            .transition(&[ExecutionStatus::Paused], ExecutionStatus::Running)
            .await
            .map_err(|status| WorkflowError::InvalidExecutionState {
                execution_id,
                status,
                operation: "resume",
            })?;
        self.inner.events.publish(WorkflowEvent::ExecutionResumed {
            execution_id,
            workflow_id: state.workflow_id(),
        });
        tracing::info!(%execution_id, "execution resumed");
        Ok(state.snapshot().await)
    }

    // -----------------------------------------------------------------------
    // Ingress
    // -----------------------------------------------------------------------

    /// Fire a named event: wake event waits, then launch every registered
    /// workflow whose filter accepts `data`.
    pub async fn trigger_event(&self, event_name: &str, data: Value) -> Vec<TriggerOutcome> {
        let waiters = self.inner.triggers.notify_waiters(event_name, data.clone());
        let targets = self.inner.triggers.event_targets(event_name);
        tracing::info!(event = event_name, waiters, workflows = targets.len(), "event fired");

        let mut outcomes = Vec::new();
        for workflow_id in targets {
            let Ok(workflow) = self.get_workflow(workflow_id).await else {
                continue;
            };
            let accepted = workflow.triggers.iter().filter(|t| t.enabled).any(|t| {
                matches!(&t.config, TriggerConfig::Event { event_name: name, filter }
                    if name == event_name && event_filter_matches(filter, &data))
            });
            if !accepted {
                tracing::debug!(%workflow_id, event = event_name, "event filter rejected payload");
                continue;
            }

            let mut inputs = Variables::new();
            inputs.insert("event".to_string(), json!({ "name": event_name, "data": data }));
            let launch = self.start_workflow(workflow_id, inputs, TriggerType::Event).await;
            outcomes.push(TriggerOutcome::from_launch(workflow_id, launch));
        }
        outcomes
    }

    /// Launch every workflow with an enabled webhook trigger on `path`/`method`.
    pub async fn trigger_webhook(&self, path: &str, method: &str, body: Value) -> Vec<TriggerOutcome> {
        self.trigger_webhook_with(path, method, body, |_| true).await
    }

    /// Like `trigger_webhook`, asking `authorize` about each matched trigger
    /// first (e.g. to verify a body signature against its secret).
    pub async fn trigger_webhook_with<F>(
        &self,
        path: &str,
        method: &str,
        body: Value,
        authorize: F,
    ) -> Vec<TriggerOutcome>
    where
        F: Fn(&WebhookTarget) -> bool,
    {
        let targets = {
            let workflows = self.inner.workflows.read().await;
            find_webhook_targets(workflows.values(), path, method)
        };
        tracing::info!(path, method, matched = targets.len(), "webhook received");

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            if !authorize(&target) {
                tracing::warn!(workflow_id = %target.workflow_id, path, "webhook rejected");
                outcomes.push(TriggerOutcome {
                    workflow_id: target.workflow_id,
                    executed: false,
                    execution_id: None,
                    error: Some("webhook signature verification failed".to_string()),
                });
                continue;
            }
            let mut inputs = Variables::new();
            inputs.insert(
                "webhook".to_string(),
                json!({ "path": path, "method": method.to_ascii_uppercase(), "body": body }),
            );
            let launch = self
                .start_workflow(target.workflow_id, inputs, TriggerType::Webhook)
                .await;
            outcomes.push(TriggerOutcome::from_launch(target.workflow_id, launch));
        }
        outcomes
    }

    /// Number of periodic jobs armed for `workflow_id`.
    pub fn active_job_count(&self, workflow_id: Uuid) -> usize {
        self.inner.triggers.scheduler().job_count(workflow_id)
    }

    /// Disarm all triggers and cancel every live execution.
    pub async fn shutdown(&self) {
        self.inner.triggers.shutdown();
        let live: Vec<Uuid> = self
            .inner
            .executions
            .read()
            .await
            .states
            .values()
            .filter(|s| s.status().is_active())
            .map(|s| s.id())
            .collect();
        for execution_id in live {
            if let Err(e) = self.cancel_execution(execution_id).await {
                tracing::debug!(%execution_id, error = %e, "execution finished before shutdown");
            }
        }
        tracing::info!("workflow manager stopped");
    }
}

impl<R: WorkflowRepository + 'static> ManagerInner<R> {
    fn reschedule(&self, workflow: &Workflow) {
        self.triggers.deactivate(workflow.metadata.id);
        self.triggers.activate(workflow, self.fire_callback());
    }

    /// Launch callback handed to background triggers.
    fn fire_callback(&self) -> TriggerFire {
        let this = self.this.clone();
        Arc::new(move |workflow_id, trigger_type, inputs| -> BoxFuture<'static, ()> {
            let this = this.clone();
            Box::pin(async move {
                let Some(inner) = this.upgrade() else {
                    return;
                };
                if let Err(e) = inner.start(workflow_id, inputs, trigger_type).await {
                    tracing::warn!(%workflow_id, trigger = %trigger_type, error = %e, "triggered launch failed");
                }
            })
        })
    }

    /// Running/Paused -> Cancelled, publishing the lifecycle event.
    async fn cancel(&self, state: &ExecutionState) -> Result<(), ExecutionStatus> {
        state
            .transition(&[ExecutionStatus::Running, ExecutionStatus::Paused], ExecutionStatus::Cancelled)
            .await?;
        let execution_id = state.id();
        self.events.publish(WorkflowEvent::ExecutionCancelled {
            execution_id,
            workflow_id: state.workflow_id(),
        });
        tracing::info!(%execution_id, "execution cancelled");
        Ok(())
    }

    async fn state(&self, execution_id: Uuid) -> Result<Arc<ExecutionState>, WorkflowError> {
        self.executions
            .read()
            .await
            .states
            .get(&execution_id)
            .cloned()
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))
    }

    async fn start(
        self: Arc<Self>,
        workflow_id: Uuid,
        inputs: Variables,
        trigger_type: TriggerType,
    ) -> Result<ExecutionHandle, WorkflowError> {
        let (state, workflow, missing) = self.admit(workflow_id, inputs, trigger_type, None).await?;
        let execution_id = state.id();
        let join = tokio::spawn(async move { self.drive(state, workflow, missing, 0).await });
        Ok(ExecutionHandle { execution_id, join })
    }

    /// Create the execution record and move it to Running, enforcing the
    /// concurrency cap for top-level launches.
    async fn admit(
        &self,
        workflow_id: Uuid,
        inputs: Variables,
        trigger_type: TriggerType,
        parent_execution_id: Option<Uuid>,
    ) -> Result<(Arc<ExecutionState>, Workflow, Vec<String>), WorkflowError> {
        let workflow = self
            .workflows
            .read()
            .await
            .get(&workflow_id)
            .cloned()
            .ok_or(WorkflowError::WorkflowNotFound(workflow_id))?;
        let (inputs, missing) = prepare_inputs(&workflow.input_variables, inputs);

        let state = Arc::new(ExecutionState::new(WorkflowExecution {
            id: Uuid::now_v7(),
            workflow_id,
            workflow_name: workflow.metadata.name.clone(),
            workflow_version: workflow.metadata.version.clone(),
            trigger_type,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            variables: inputs.clone(),
            inputs,
            outputs: Variables::new(),
            step_results: Vec::new(),
            error: None,
            parent_execution_id,
        }));

        {
            let mut table = self.executions.write().await;
            if parent_execution_id.is_none() {
                let max = self.config.max_concurrent_executions;
                if table.occupied() >= max {
                    tracing::warn!(%workflow_id, max, "execution rejected, at capacity");
                    return Err(WorkflowError::CapacityExceeded { max });
                }
            }
            table.insert(state.clone(), parent_execution_id.is_some());
            if let Err(status) = state
                .transition(&[ExecutionStatus::Pending], ExecutionStatus::Running)
                .await
            {
                tracing::warn!(execution_id = %state.id(), %status, "new execution was not pending");
            }
        }

        self.events.publish(WorkflowEvent::ExecutionStarted {
            execution_id: state.id(),
            workflow_id,
            trigger_type,
        });
        tracing::info!(
            execution_id = %state.id(),
            %workflow_id,
            trigger = %trigger_type,
            parent = ?parent_execution_id,
            "execution started"
        );
        Ok((state, workflow, missing))
    }

    /// Run the step list and settle the terminal status.
    async fn drive(
        &self,
        state: Arc<ExecutionState>,
        workflow: Workflow,
        missing: Vec<String>,
        depth: u32,
    ) -> WorkflowExecution {
        let execution_id = state.id();
        let workflow_id = workflow.metadata.id;

        let outcome = if missing.is_empty() {
            let scope = RunScope {
                default_timeout: workflow
                    .settings
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.config.default_step_timeout()),
                default_strategy: workflow.settings.on_error,
                depth,
            };
            match self.runner.execute_steps(&state, &workflow.steps, scope).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    let failed_step = state
                        .snapshot()
                        .await
                        .step_results
                        .iter()
                        .rev()
                        .find(|r| r.status == StepStatus::Failed)
                        .map(|r| r.step_id.clone())
                        .unwrap_or_default();
                    Err(e.into_workflow_error(&failed_step))
                }
            }
        } else {
            Err(WorkflowError::ValidationError(format!(
                "missing required input(s): {}",
                missing.join(", ")
            )))
        };

        match outcome {
            Ok(()) => {
                // A pause requested during the last step holds completion.
                if state.wait_until_runnable().await {
                    let outputs = collect_outputs(&workflow.output_variables, &state.variables().await);
                    if state.complete(outputs).await {
                        let duration_ms = state
                            .snapshot()
                            .await
                            .duration_ms()
                            .and_then(|ms| u64::try_from(ms).ok())
                            .unwrap_or(0);
                        self.events.publish(WorkflowEvent::ExecutionCompleted {
                            execution_id,
                            workflow_id,
                            duration_ms,
                        });
                        tracing::info!(%execution_id, %workflow_id, duration_ms, "execution completed");
                    }
                }
            }
            Err(e) => {
                let error = e.to_string();
                if state.fail(error.clone()).await {
                    self.events.publish(WorkflowEvent::ExecutionFailed {
                        execution_id,
                        workflow_id,
                        error: error.clone(),
                    });
                    tracing::warn!(%execution_id, %workflow_id, error = %error, "execution failed");
                }
            }
        }

        let record = state.snapshot().await;
        self.executions
            .write()
            .await
            .finish(execution_id, self.config.max_execution_history);
        record
    }
}

impl<R: WorkflowRepository + 'static> SubWorkflowLauncher for ManagerInner<R> {
    fn run_child(
        &self,
        workflow_id: Uuid,
        inputs: Variables,
        parent_execution_id: Uuid,
        depth: u32,
    ) -> BoxFuture<'_, Result<WorkflowExecution, WorkflowError>> {
        Box::pin(async move {
            let (state, workflow, missing) = self
                .admit(workflow_id, inputs, TriggerType::Subworkflow, Some(parent_execution_id))
                .await?;
            let execution_id = state.id();
            let Some(inner) = self.this.upgrade() else {
                return Err(WorkflowError::ExecutionAborted {
                    execution_id,
                    reason: "workflow manager dropped".to_string(),
                });
            };

            // The parent step may be dropped mid-flight (timeout); the guard
            // then cancels the child so its record still settles.
            let abandoned = CancellationToken::new();
            let guard = abandoned.clone().drop_guard();
            let join = tokio::spawn(async move {
                let drive = inner.drive(state.clone(), workflow, missing, depth);
                tokio::pin!(drive);
                tokio::select! {
                    record = &mut drive => record,
                    _ = abandoned.cancelled() => {
                        if inner.cancel(&state).await.is_ok() {
                            tracing::warn!(%execution_id, %parent_execution_id, "sub-workflow abandoned by its parent");
                        }
                        drive.await
                    }
                }
            });

            let record = join.await.map_err(|e| WorkflowError::ExecutionAborted {
                execution_id,
                reason: e.to_string(),
            });
            guard.disarm();
            record
        })
    }
}

fn step_index(workflow: &Workflow, step_id: &str) -> Result<usize, WorkflowError> {
    workflow
        .steps
        .iter()
        .position(|s| s.id == step_id)
        .ok_or_else(|| WorkflowError::StepNotFound {
            workflow_id: workflow.metadata.id,
            step_id: step_id.to_string(),
        })
}

/// Fill declared defaults; report required inputs that are still missing.
fn prepare_inputs(declared: &[VariableDefinition], mut inputs: Variables) -> (Variables, Vec<String>) {
    let mut missing = Vec::new();
    for def in declared {
        if inputs.contains_key(&def.name) {
            continue;
        }
        match &def.default {
            Some(default) => {
                inputs.insert(def.name.clone(), default.clone());
            }
            None if def.required => missing.push(def.name.clone()),
            None => {}
        }
    }
    (inputs, missing)
}

fn collect_outputs(declared: &[VariableDefinition], variables: &Variables) -> Variables {
    declared
        .iter()
        .filter_map(|def| variables.get(&def.name).map(|v| (def.name.clone(), v.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
