//! Trigger manager that arms and disarms workflow triggers.
//!
//! `TriggerManager` routes each enabled `TriggerConfig` to the subsystem
//! that watches for it:
//! - `schedule` -> interval and/or cron jobs in the [`JobScheduler`]
//! - `condition` -> a poll job evaluating against the ambient clock context
//! - `event` -> the event-name index consulted by `trigger_event`
//! - `webhook` -> nothing up front; matched lazily by path and method
//! - `manual` / `hotkey` -> nothing (hotkeys belong to the host)
//!
//! Activation is idempotent and deactivation tears down exactly one
//! workflow's registrations.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_types::workflow::{
    ConditionLogic, TriggerConfig, TriggerType, Variables, Workflow, WorkflowCondition,
};
use chrono::{DateTime, Datelike, Local, Timelike};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use uuid::Uuid;

use super::condition::ConditionEvaluator;
use super::scheduler::{JobCallback, JobScheduler, ScheduleWindow};
use crate::event::EventSignals;

/// Launches a workflow on behalf of a background trigger.
///
/// Arguments: workflow id, trigger kind, launch inputs.
pub type TriggerFire =
    Arc<dyn Fn(Uuid, TriggerType, Variables) -> BoxFuture<'static, ()> + Send + Sync>;

/// An enabled webhook trigger that matched an incoming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub workflow_id: Uuid,
    pub trigger_id: String,
    pub secret: Option<String>,
}

pub struct TriggerManager {
    scheduler: JobScheduler,
    /// event name -> workflows listening for it.
    event_index: DashMap<String, HashSet<Uuid>>,
    signals: EventSignals,
    condition_interval: Duration,
    /// When false, schedule and condition triggers are not armed.
    timers_enabled: AtomicBool,
}

impl TriggerManager {
    pub fn new(signals: EventSignals, condition_interval: Duration) -> Self {
        Self {
            scheduler: JobScheduler::new(),
            event_index: DashMap::new(),
            signals,
            condition_interval,
            timers_enabled: AtomicBool::new(true),
        }
    }

    /// Turn background timers on or off for subsequent activations.
    ///
    /// Event registrations are unaffected; already-armed jobs keep running.
    pub fn set_timers_enabled(&self, enabled: bool) {
        self.timers_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn timers_enabled(&self) -> bool {
        self.timers_enabled.load(Ordering::SeqCst)
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn signals(&self) -> &EventSignals {
        &self.signals
    }

    /// Arm every enabled trigger of an enabled workflow.
    ///
    /// Returns the number of background registrations made.
    pub fn activate(&self, workflow: &Workflow, fire: TriggerFire) -> usize {
        let workflow_id = workflow.metadata.id;
        if !workflow.metadata.enabled {
            tracing::debug!(%workflow_id, "workflow disabled, triggers not armed");
            return 0;
        }

        let timers = self.timers_enabled();
        let mut armed = 0;
        for trigger in workflow.triggers.iter().filter(|t| t.enabled) {
            match &trigger.config {
                TriggerConfig::Schedule { .. } | TriggerConfig::Condition { .. } if !timers => {
                    tracing::debug!(%workflow_id, trigger_id = %trigger.id, "timers disabled, trigger not armed");
                }
                TriggerConfig::Manual {} | TriggerConfig::Webhook { .. } => {}
                TriggerConfig::Hotkey { keys } => {
                    tracing::debug!(%workflow_id, keys, "hotkey trigger left to the host");
                }
                TriggerConfig::Schedule {
                    cron,
                    interval_ms,
                    start_at,
                    end_at,
                } => {
                    let window = ScheduleWindow {
                        start_at: *start_at,
                        end_at: *end_at,
                    };
                    let callback = schedule_callback(fire.clone());
                    if let Some(ms) = interval_ms {
                        let key = format!("{}:interval", trigger.id);
                        if self.scheduler.schedule_interval(
                            workflow_id,
                            &key,
                            Duration::from_millis(*ms),
                            window,
                            callback.clone(),
                        ) {
                            armed += 1;
                        }
                    }
                    if let Some(expression) = cron {
                        let key = format!("{}:cron", trigger.id);
                        match self
                            .scheduler
                            .schedule_cron(workflow_id, &key, expression, window, callback)
                        {
                            Ok(true) => armed += 1,
                            Ok(false) => {}
                            Err(e) => tracing::warn!(
                                %workflow_id,
                                expression = %expression,
                                error = %e,
                                "invalid cron expression, trigger will never fire"
                            ),
                        }
                    }
                }
                TriggerConfig::Event { event_name, .. } => {
                    if self
                        .event_index
                        .entry(event_name.clone())
                        .or_default()
                        .insert(workflow_id)
                    {
                        armed += 1;
                    }
                }
                TriggerConfig::Condition { conditions, logic } => {
                    let callback =
                        condition_callback(conditions.clone(), *logic, fire.clone());
                    if self.scheduler.schedule_condition_poll(
                        workflow_id,
                        &trigger.id,
                        self.condition_interval,
                        callback,
                    ) {
                        armed += 1;
                    }
                }
            }
        }

        if armed > 0 {
            tracing::info!(%workflow_id, armed, "triggers activated");
        }
        armed
    }

    /// Disarm everything registered for `workflow_id`.
    pub fn deactivate(&self, workflow_id: Uuid) {
        self.scheduler.cancel_workflow_jobs(workflow_id);
        self.event_index.retain(|_, ids| {
            ids.remove(&workflow_id);
            !ids.is_empty()
        });
    }

    /// Workflows registered for `event_name`.
    pub fn event_targets(&self, event_name: &str) -> Vec<Uuid> {
        self.event_index
            .get(event_name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Wake `wait` steps blocked on `event_name`.
    pub fn notify_waiters(&self, event_name: &str, data: Value) -> usize {
        self.signals.fire(event_name, data)
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.event_index.clear();
    }
}

fn schedule_callback(fire: TriggerFire) -> JobCallback {
    Arc::new(move |workflow_id| fire(workflow_id, TriggerType::Schedule, Variables::new()))
}

fn condition_callback(
    conditions: Vec<WorkflowCondition>,
    logic: ConditionLogic,
    fire: TriggerFire,
) -> JobCallback {
    Arc::new(move |workflow_id| -> BoxFuture<'static, ()> {
        let context = ambient_context(&Local::now());
        if ConditionEvaluator::evaluate(&conditions, logic, &context) {
            tracing::debug!(%workflow_id, "condition trigger met");
            fire(workflow_id, TriggerType::Condition, context)
        } else {
            Box::pin(async {})
        }
    })
}

/// Variables polled condition triggers are evaluated against.
///
/// `{now: {timestamp, minute, hour, day, month, weekday}}`, weekday 0 = Sunday.
pub fn ambient_context(now: &DateTime<Local>) -> Variables {
    let mut vars = Variables::new();
    vars.insert(
        "now".to_string(),
        json!({
            "timestamp": now.to_rfc3339(),
            "minute": now.minute(),
            "hour": now.hour(),
            "day": now.day(),
            "month": now.month(),
            "weekday": now.weekday().num_days_from_sunday(),
        }),
    );
    vars
}

/// Whether an event payload passes an event trigger's filter (AND).
///
/// Object payloads are matched field by field; any other payload is
/// exposed as `value`.
pub fn event_filter_matches(filter: &[WorkflowCondition], data: &Value) -> bool {
    if filter.is_empty() {
        return true;
    }
    let vars = match data {
        Value::Object(fields) => fields.clone(),
        other => {
            let mut vars = Variables::new();
            vars.insert("value".to_string(), other.clone());
            vars
        }
    };
    ConditionEvaluator::evaluate(filter, ConditionLogic::And, &vars)
}

/// Enabled webhook triggers of enabled workflows matching `path` and `method`.
///
/// Paths compare without surrounding slashes; methods compare
/// case-insensitively and `*` accepts any method.
pub fn find_webhook_targets<'a>(
    workflows: impl IntoIterator<Item = &'a Workflow>,
    path: &str,
    method: &str,
) -> Vec<WebhookTarget> {
    let wanted = normalize_path(path);
    let mut targets = Vec::new();
    for workflow in workflows {
        if !workflow.metadata.enabled {
            continue;
        }
        for trigger in workflow.triggers.iter().filter(|t| t.enabled) {
            let TriggerConfig::Webhook {
                path: trigger_path,
                methods,
                secret,
            } = &trigger.config
            else {
                continue;
            };
            let method_ok = methods
                .iter()
                .any(|m| m == "*" || m.eq_ignore_ascii_case(method));
            if normalize_path(trigger_path) == wanted && method_ok {
                targets.push(WebhookTarget {
                    workflow_id: workflow.metadata.id,
                    trigger_id: trigger.id.clone(),
                    secret: secret.clone(),
                });
            }
        }
    }
    targets
}

fn normalize_path(path: &str) -> &str {
    path.trim().trim_matches('/')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
