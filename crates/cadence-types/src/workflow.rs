//! Workflow domain types for Cadence.
//!
//! A `Workflow` is a named automation: an ordered list of triggers that arm
//! it and an ordered list of recursively composable steps that it runs.
//! This module also holds the execution record types (`WorkflowExecution`,
//! `StepExecutionResult`) and the condition vocabulary shared by triggers,
//! branches, loops and waits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The mutable key/value scope an execution threads through its steps.
pub type Variables = serde_json::Map<String, Value>;

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A stored automation definition.
///
/// Persisted as one YAML document per workflow. `metadata.id` never changes
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub metadata: WorkflowMetadata,
    /// Rules that launch this workflow.
    #[serde(default)]
    pub triggers: Vec<WorkflowTrigger>,
    /// Ordered top-level step list.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    /// Declared inputs (defaults and required checks are applied at launch).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_variables: Vec<VariableDefinition>,
    /// Declared outputs (copied from the variable bag on completion).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl Workflow {
    /// Find a top-level step by id.
    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Whether any trigger of the given type is enabled.
    pub fn has_enabled_trigger(&self, trigger_type: TriggerType) -> bool {
        self.triggers
            .iter()
            .any(|t| t.enabled && t.config.trigger_type() == trigger_type)
    }
}

/// Identity and bookkeeping for a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// UUIDv7 assigned on creation.
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form version string, snapshotted into every execution.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Disabled workflows keep their definition but arm no triggers.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_system: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_template: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Workflow-wide defaults applied to steps that do not override them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Error strategy for steps without their own `on_error`.
    #[serde(default)]
    pub on_error: ErrorStrategy,
    /// Step timeout in milliseconds for steps without their own `timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A declared input or output variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Any,
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// A rule that causes a workflow to launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    /// Stable trigger id; generated when the workflow is stored without one.
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub config: TriggerConfig,
}

impl WorkflowTrigger {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            enabled: true,
            config,
        }
    }

    pub fn manual() -> Self {
        Self::new(TriggerConfig::Manual {})
    }
}

/// Trigger-kind specific configuration.
///
/// ```yaml
/// config:
///   type: schedule
///   cron: "*/15 * * * *"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Launched explicitly through the CLI or API.
    Manual {},
    /// Cron expression and/or fixed interval, optionally bounded by a window.
    Schedule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cron: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_at: Option<DateTime<Utc>>,
    },
    /// Named event fired through the event ingress.
    Event {
        event_name: String,
        /// Conditions (AND) evaluated against the event payload.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filter: Vec<WorkflowCondition>,
    },
    /// Conditions polled on a short fixed interval.
    Condition {
        conditions: Vec<WorkflowCondition>,
        #[serde(default)]
        logic: ConditionLogic,
    },
    /// Incoming HTTP call matched by path and method.
    Webhook {
        path: String,
        #[serde(default = "default_webhook_methods")]
        methods: Vec<String>,
        /// Shared secret for HMAC-SHA256 body signatures.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
    /// Key combination; arming is the host environment's job.
    Hotkey { keys: String },
}

fn default_webhook_methods() -> Vec<String> {
    vec!["POST".to_string()]
}

impl TriggerConfig {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Manual {} => TriggerType::Manual,
            Self::Schedule { .. } => TriggerType::Schedule,
            Self::Event { .. } => TriggerType::Event,
            Self::Condition { .. } => TriggerType::Condition,
            Self::Webhook { .. } => TriggerType::Webhook,
            Self::Hotkey { .. } => TriggerType::Hotkey,
        }
    }
}

/// What launched an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Schedule,
    Event,
    Condition,
    Webhook,
    Hotkey,
    Subworkflow,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Schedule => "schedule",
            Self::Event => "event",
            Self::Condition => "condition",
            Self::Webhook => "webhook",
            Self::Hotkey => "hotkey",
            Self::Subworkflow => "subworkflow",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One unit of work. Step ids are unique within their enclosing list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides `WorkflowSettings::on_error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ErrorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Overrides `WorkflowSettings::timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub config: StepConfig,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: StepConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            on_error: None,
            retry: None,
            timeout_ms: None,
            config,
        }
    }
}

/// Step-kind specific configuration, internally tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Invoke one external action by type.
    Action {
        action_type: String,
        #[serde(default)]
        params: Value,
        /// Variable receiving the action output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_variable: Option<String>,
    },
    /// Branch on a condition list.
    Condition {
        conditions: Vec<WorkflowCondition>,
        #[serde(default)]
        logic: ConditionLogic,
        #[serde(default)]
        then_steps: Vec<WorkflowStep>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_steps: Option<Vec<WorkflowStep>>,
    },
    /// Repeat a nested step list.
    Loop {
        loop_type: LoopType,
        /// Iteration count for `count` loops.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
        /// Re-checked before each iteration of `while` loops.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        conditions: Vec<WorkflowCondition>,
        #[serde(default)]
        logic: ConditionLogic,
        /// Dotted path to the array iterated by `for_each` loops.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<String>,
        /// Variable bound to the current element (default `$item`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_variable: Option<String>,
        /// Hard upper bound on iterations (default 1000).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u64>,
        steps: Vec<WorkflowStep>,
    },
    /// Run named branches concurrently.
    Parallel {
        branches: Vec<ParallelBranch>,
        #[serde(default)]
        wait_for: ParallelWait,
    },
    /// Suspend on a duration, a named event and/or a condition.
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        conditions: Vec<WorkflowCondition>,
        #[serde(default)]
        logic: ConditionLogic,
    },
    /// Ask the host for a value.
    Input {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
        result_variable: String,
    },
    /// Send a templated notification.
    Notification {
        title: String,
        message: String,
        #[serde(default)]
        level: NotificationLevel,
    },
    /// Evaluate a sandboxed expression over mapped variables.
    Script {
        language: String,
        code: String,
        /// Bag variables exposed to the script.
        #[serde(default)]
        input_variables: Vec<String>,
        /// Result fields written back into the bag.
        #[serde(default)]
        output_variables: Vec<String>,
    },
    /// Run another workflow to completion.
    Subworkflow {
        workflow_id: Uuid,
        /// Child input name -> dotted path in the parent bag.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        input_mapping: BTreeMap<String, String>,
        /// Parent variable name -> dotted path in the child bag.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        output_mapping: BTreeMap<String, String>,
    },
    /// A `type` this build does not know; fails at run time.
    #[serde(other)]
    Unsupported,
}

impl StepConfig {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Action { .. } => "action",
            Self::Condition { .. } => "condition",
            Self::Loop { .. } => "loop",
            Self::Parallel { .. } => "parallel",
            Self::Wait { .. } => "wait",
            Self::Input { .. } => "input",
            Self::Notification { .. } => "notification",
            Self::Script { .. } => "script",
            Self::Subworkflow { .. } => "subworkflow",
            Self::Unsupported => "unsupported",
        }
    }

    /// Every nested step list this step owns.
    pub fn child_step_lists(&self) -> Vec<&[WorkflowStep]> {
        match self {
            Self::Condition {
                then_steps,
                else_steps,
                ..
            } => {
                let mut lists = vec![then_steps.as_slice()];
                if let Some(else_steps) = else_steps {
                    lists.push(else_steps.as_slice());
                }
                lists
            }
            Self::Loop { steps, .. } => vec![steps.as_slice()],
            Self::Parallel { branches, .. } => {
                branches.iter().map(|b| b.steps.as_slice()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    Count,
    While,
    ForEach,
}

/// A named branch of a parallel step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelBranch {
    pub name: String,
    pub steps: Vec<WorkflowStep>,
}

/// How a parallel step combines its branches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelWait {
    #[default]
    All,
    Any,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// What happens when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Fail the enclosing execution.
    #[default]
    Stop,
    /// Record the failure and move on.
    Continue,
    /// Re-run per the step's `retry` policy, then behave like `Stop`.
    Retry,
    /// Behaves like `Stop`.
    Fallback,
}

/// Retry policy for a step using `ErrorStrategy::Retry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between attempts (default 1000ms).
    #[serde(default = "default_retry_interval_ms")]
    pub interval_ms: u64,
    /// Double the delay after each failed attempt.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exponential_backoff: bool,
    /// Upper bound on the delay when backing off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_ms: Option<u64>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval_ms: default_retry_interval_ms(),
            exponential_backoff: false,
            max_interval_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// A single predicate over the variable bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCondition {
    /// Dotted path into the variable bag (e.g. `user.profile.age`).
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub negate: bool,
}

impl WorkflowCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            negate: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    IsEmpty,
    IsNotEmpty,
    MatchesRegex,
    /// Any operator name this build does not know; always evaluates false.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Occupies a concurrency slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

/// Outcome of one step (after all of its attempts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecutionResult {
    pub step_id: String,
    pub step_name: String,
    pub step_type: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retries performed before this outcome (0 when the first attempt decided it).
    #[serde(default)]
    pub retry_count: u32,
}

/// One runtime instance of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Denormalized for display.
    pub workflow_name: String,
    /// `metadata.version` at launch.
    pub workflow_version: String,
    pub trigger_type: TriggerType,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inputs: Variables,
    #[serde(default)]
    pub outputs: Variables,
    /// Variable bag seeded from `inputs`.
    #[serde(default)]
    pub variables: Variables,
    /// Append-only, in completion order.
    #[serde(default)]
    pub step_results: Vec<StepExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on executions launched by a `subworkflow` step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<Uuid>,
}

impl WorkflowExecution {
    /// Wall-clock duration, once the execution has finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_YAML: &str = r#"
metadata:
  id: 01926f4e-8c4a-7b2e-9a1d-3f5e6a7b8c9d
  name: morning-routine
  created_at: 2026-01-05T08:00:00Z
  updated_at: 2026-01-05T08:00:00Z
triggers:
  - id: every-quarter
    config:
      type: schedule
      cron: "*/15 * * * *"
  - config:
      type: webhook
      path: /hooks/morning
steps:
  - id: greet
    name: Greet
    config:
      type: notification
      title: "Hello {{user}}"
      message: "Starting"
  - id: repeat
    name: Repeat
    on_error: continue
    config:
      type: loop
      loop_type: count
      count: 3
      steps:
        - id: ping
          name: Ping
          config:
            type: action
            action_type: echo
            params: { n: 1 }
"#;

    #[test]
    fn test_workflow_yaml_defaults() {
        let wf: Workflow = serde_yaml_ng::from_str(SAMPLE_YAML).unwrap();
        assert_eq!(wf.metadata.version, "1.0.0");
        assert!(wf.metadata.enabled);
        assert!(!wf.metadata.is_system);
        assert_eq!(wf.settings.on_error, ErrorStrategy::Stop);

        assert_eq!(wf.triggers.len(), 2);
        assert_eq!(wf.triggers[0].id, "every-quarter");
        assert!(wf.triggers[1].id.is_empty());
        match &wf.triggers[1].config {
            TriggerConfig::Webhook { methods, secret, .. } => {
                assert_eq!(methods, &vec!["POST".to_string()]);
                assert!(secret.is_none());
            }
            other => panic!("expected webhook trigger, got {other:?}"),
        }

        assert_eq!(wf.steps[1].on_error, Some(ErrorStrategy::Continue));
        assert_eq!(wf.steps[1].config.kind_name(), "loop");
        assert_eq!(wf.steps[1].config.child_step_lists()[0][0].id, "ping");
    }

    #[test]
    fn test_workflow_yaml_roundtrip_keeps_structure() {
        let wf: Workflow = serde_yaml_ng::from_str(SAMPLE_YAML).unwrap();
        let yaml = serde_yaml_ng::to_string(&wf).unwrap();
        let parsed: Workflow = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed.metadata.id, wf.metadata.id);
        assert_eq!(parsed.steps.len(), 2);
        assert!(!yaml.contains("is_system"));
    }

    #[test]
    fn test_unknown_step_type_is_unsupported() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "id": "x",
            "name": "X",
            "config": { "type": "teleport" }
        }))
        .unwrap();
        assert!(matches!(step.config, StepConfig::Unsupported));
        assert!(step.enabled);
    }

    #[test]
    fn test_unknown_operator_deserializes() {
        let cond: WorkflowCondition = serde_json::from_value(json!({
            "field": "a",
            "operator": "sounds_like",
            "value": "b"
        }))
        .unwrap();
        assert_eq!(cond.operator, ConditionOperator::Unknown);
        assert!(!cond.negate);
    }

    #[test]
    fn test_condition_operator_names() {
        let ops: Vec<ConditionOperator> = serde_json::from_value(json!([
            "equals", "not_equals", "contains", "not_contains", "starts_with",
            "ends_with", "greater_than", "less_than", "greater_than_or_equal",
            "less_than_or_equal", "is_empty", "is_not_empty", "matches_regex"
        ]))
        .unwrap();
        assert_eq!(ops.len(), 13);
        assert!(!ops.contains(&ConditionOperator::Unknown));
    }

    #[test]
    fn test_execution_status_classification() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
        assert!(ExecutionStatus::Paused.is_active());
        assert!(!ExecutionStatus::Pending.is_active());
        assert_eq!(ExecutionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy: RetryPolicy = serde_json::from_value(json!({})).unwrap();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.interval_ms, 1000);
        assert!(!policy.exponential_backoff);
    }

    #[test]
    fn test_trigger_type_mapping() {
        let t = TriggerConfig::Hotkey {
            keys: "ctrl+shift+m".to_string(),
        };
        assert_eq!(t.trigger_type(), TriggerType::Hotkey);
        assert_eq!(TriggerType::Subworkflow.to_string(), "subworkflow");
    }
}
