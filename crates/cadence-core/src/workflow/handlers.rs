//! Collaborator traits the step interpreter delegates side effects to.
//!
//! The engine itself is pure orchestration: `action` steps go through an
//! [`ActionExecutor`] looked up by action type in an [`ActionRegistry`],
//! `input` steps through an [`InputHandler`], and `notification` steps
//! through a [`NotificationHandler`]. Implementations live in
//! `cadence-infra` (built-in actions) and `cadence-api` (terminal prompts).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cadence_types::workflow::NotificationLevel;
use serde_json::Value;
use uuid::Uuid;

/// Boxed future returned by the object-safe handler traits.
pub type HandlerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// One invocation of an external action.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub execution_id: Uuid,
    pub step_id: String,
    pub action_type: String,
    /// Parameters after template resolution.
    pub params: Value,
}

/// What an action reports back.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Executes one kind of action (shell, file, network, ...).
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome>;
}

/// Adapter turning a synchronous closure into an [`ActionExecutor`].
pub struct FnAction<F>(pub F);

impl<F> ActionExecutor for FnAction<F>
where
    F: Fn(ActionRequest) -> ActionOutcome + Send + Sync,
{
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        let outcome = (self.0)(request);
        Box::pin(async move { outcome })
    }
}

/// Action executors keyed by action type.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    executors: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for `action_type`.
    pub fn register(&mut self, action_type: impl Into<String>, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(action_type.into(), executor);
    }

    /// Builder-style `register`.
    pub fn with(mut self, action_type: impl Into<String>, executor: Arc<dyn ActionExecutor>) -> Self {
        self.register(action_type, executor);
        self
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.get(action_type).cloned()
    }

    /// Registered action types, sorted.
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("action_types", &self.action_types())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Input and notifications
// ---------------------------------------------------------------------------

/// A request for a value from whoever is operating the host.
#[derive(Debug, Clone)]
pub struct InputRequest {
    pub execution_id: Uuid,
    pub step_id: String,
    /// Prompt after template resolution.
    pub prompt: String,
    pub input_type: Option<String>,
    pub default: Option<Value>,
}

pub trait InputHandler: Send + Sync {
    fn request_input(&self, request: InputRequest) -> HandlerFuture<'_, Result<Value, String>>;
}

/// A rendered notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub execution_id: Uuid,
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
}

pub trait NotificationHandler: Send + Sync {
    fn notify(&self, notification: Notification) -> HandlerFuture<'_, Result<(), String>>;
}

/// Everything the interpreter delegates to.
#[derive(Clone, Default)]
pub struct StepHandlers {
    pub actions: ActionRegistry,
    pub input: Option<Arc<dyn InputHandler>>,
    pub notifier: Option<Arc<dyn NotificationHandler>>,
}

impl StepHandlers {
    pub fn new(actions: ActionRegistry) -> Self {
        Self {
            actions,
            input: None,
            notifier: None,
        }
    }

    pub fn with_input(mut self, handler: Arc<dyn InputHandler>) -> Self {
        self.input = Some(handler);
        self
    }

    pub fn with_notifier(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.notifier = Some(handler);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action_type: &str) -> ActionRequest {
        ActionRequest {
            execution_id: Uuid::now_v7(),
            step_id: "s".to_string(),
            action_type: action_type.to_string(),
            params: json!({"v": 1}),
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_fn_action() {
        let registry = ActionRegistry::new().with(
            "echo",
            Arc::new(FnAction(|req: ActionRequest| ActionOutcome::ok(req.params))),
        );

        assert!(registry.get("shell").is_none());
        let echo = registry.get("echo").unwrap();
        let outcome = echo.execute(request("echo")).await;
        assert!(outcome.success);
        assert_eq!(outcome.output, json!({"v": 1}));
    }

    #[test]
    fn test_action_types_sorted() {
        let noop = Arc::new(FnAction(|_req: ActionRequest| ActionOutcome::ok(Value::Null)));
        let mut registry = ActionRegistry::new();
        registry.register("shell", noop.clone());
        registry.register("echo", noop);
        assert_eq!(registry.action_types(), vec!["echo", "shell"]);
        assert!(format!("{registry:?}").contains("echo"));
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = ActionOutcome::failed("exit status 1");
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("exit status 1"));
    }
}
