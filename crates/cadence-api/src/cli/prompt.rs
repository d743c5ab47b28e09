//! Terminal collaborators for `input` and `notification` steps.

use cadence_core::workflow::handlers::{
    HandlerFuture, InputHandler, InputRequest, Notification, NotificationHandler,
};
use cadence_types::workflow::NotificationLevel;
use console::style;
use dialoguer::{Confirm, Input, Password};
use serde_json::Value;

/// Prompts on the controlling terminal with dialoguer.
///
/// dialoguer blocks, so every prompt runs on the blocking pool.
pub struct TerminalInput;

impl InputHandler for TerminalInput {
    fn request_input(&self, request: InputRequest) -> HandlerFuture<'_, Result<Value, String>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || prompt(&request))
                .await
                .map_err(|e| format!("input prompt aborted: {e}"))?
        })
    }
}

fn prompt(request: &InputRequest) -> Result<Value, String> {
    let input_type = request.input_type.as_deref().unwrap_or("text");
    match input_type {
        "boolean" | "confirm" => {
            let mut confirm = Confirm::new().with_prompt(&request.prompt);
            if let Some(default) = request.default.as_ref().and_then(Value::as_bool) {
                confirm = confirm.default(default);
            }
            confirm.interact().map(Value::Bool).map_err(|e| e.to_string())
        }
        "password" | "secret" => Password::new()
            .with_prompt(&request.prompt)
            .interact()
            .map(Value::String)
            .map_err(|e| e.to_string()),
        _ => {
            let mut input = Input::<String>::new().with_prompt(&request.prompt);
            if let Some(default) = &request.default {
                input = input.default(display_default(default));
            }
            let text = input.interact_text().map_err(|e| e.to_string())?;
            Ok(coerce_answer(input_type, text))
        }
    }
}

fn display_default(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turn a typed answer into JSON: numbers for `number` prompts, JSON for
/// `json` prompts (falling back to the raw text), strings otherwise.
pub fn coerce_answer(input_type: &str, text: String) -> Value {
    match input_type {
        "number" => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Some(Value::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n).map(Value::Number)
                }
            })
            .unwrap_or(Value::String(text)),
        "json" => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

/// Prints notifications to stderr, styled by level.
pub struct ConsoleNotifier;

impl NotificationHandler for ConsoleNotifier {
    fn notify(&self, notification: Notification) -> HandlerFuture<'_, Result<(), String>> {
        Box::pin(async move {
            let marker = match notification.level {
                NotificationLevel::Info => style("ℹ").cyan(),
                NotificationLevel::Success => style("✓").green(),
                NotificationLevel::Warning => style("!").yellow(),
                NotificationLevel::Error => style("✗").red(),
            };
            eprintln!(
                "  {} {}  {}",
                marker.bold(),
                style(&notification.title).bold(),
                notification.message
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_number_answers() {
        assert_eq!(coerce_answer("number", "42".to_string()), json!(42));
        assert_eq!(coerce_answer("number", " 2.5 ".to_string()), json!(2.5));
        assert_eq!(coerce_answer("number", "many".to_string()), json!("many"));
    }

    #[test]
    fn test_coerce_json_and_text_answers() {
        assert_eq!(coerce_answer("json", r#"{"a":1}"#.to_string()), json!({"a": 1}));
        assert_eq!(coerce_answer("json", "{broken".to_string()), json!("{broken"));
        assert_eq!(coerce_answer("text", "42".to_string()), json!("42"));
    }

    #[tokio::test]
    async fn test_console_notifier_accepts_every_level() {
        for level in [
            NotificationLevel::Info,
            NotificationLevel::Success,
            NotificationLevel::Warning,
            NotificationLevel::Error,
        ] {
            let result = ConsoleNotifier
                .notify(Notification {
                    execution_id: uuid::Uuid::now_v7(),
                    title: "Backup".to_string(),
                    message: "done".to_string(),
                    level,
                })
                .await;
            assert!(result.is_ok());
        }
    }
}
