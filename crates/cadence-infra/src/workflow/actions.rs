//! Built-in action backends.
//!
//! Each backend implements [`ActionExecutor`] for one action type and reads
//! its parameters from the (already template-resolved) `params` object:
//!
//! | type           | params                                          | output                                  |
//! |----------------|-------------------------------------------------|-----------------------------------------|
//! | `echo`         | anything                                        | the params, unchanged                   |
//! | `log`          | `message`, `level?`                             | `{logged}`                              |
//! | `shell`        | `command`, `cwd?`, `env?`                       | `{stdout, stderr, exit_code}`           |
//! | `file_read`    | `path`                                          | `{path, content, bytes}`                |
//! | `file_write`   | `path`, `content`, `append?`                    | `{path, bytes}`                         |
//! | `http_request` | `url`, `method?`, `headers?`, `body?`           | `{status, headers, body}`               |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cadence_core::workflow::handlers::{
    ActionExecutor, ActionOutcome, ActionRegistry, ActionRequest, HandlerFuture,
};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;

use crate::filesystem::expand_tilde;

/// Per-request timeout of the `http_request` client.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Registry holding every built-in backend.
pub fn builtin_actions() -> anyhow::Result<ActionRegistry> {
    Ok(ActionRegistry::new()
        .with("echo", Arc::new(EchoAction))
        .with("log", Arc::new(LogAction))
        .with("shell", Arc::new(ShellAction))
        .with("file_read", Arc::new(FileReadAction))
        .with("file_write", Arc::new(FileWriteAction))
        .with("http_request", Arc::new(HttpRequestAction::new()?)))
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn required_str<'a>(request: &'a ActionRequest, key: &str) -> Result<&'a str, ActionOutcome> {
    str_param(&request.params, key).ok_or_else(|| {
        ActionOutcome::failed(format!(
            "{} action requires a string '{key}' parameter",
            request.action_type
        ))
    })
}

// ---------------------------------------------------------------------------
// echo / log
// ---------------------------------------------------------------------------

/// Returns its parameters as output.
pub struct EchoAction;

impl ActionExecutor for EchoAction {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        Box::pin(async move { ActionOutcome::ok(request.params) })
    }
}

/// Writes `message` to the tracing log at `level` (default `info`).
pub struct LogAction;

impl ActionExecutor for LogAction {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        Box::pin(async move {
            let message = match &request.params {
                Value::String(s) => s.clone(),
                params => match str_param(params, "message") {
                    Some(m) => m.to_string(),
                    None => params.to_string(),
                },
            };
            let execution_id = request.execution_id;
            let step_id = request.step_id.as_str();
            match str_param(&request.params, "level").unwrap_or("info") {
                "error" => tracing::error!(%execution_id, step_id, "{message}"),
                "warn" | "warning" => tracing::warn!(%execution_id, step_id, "{message}"),
                "debug" => tracing::debug!(%execution_id, step_id, "{message}"),
                _ => tracing::info!(%execution_id, step_id, "{message}"),
            }
            ActionOutcome::ok(json!({ "logged": message }))
        })
    }
}

// ---------------------------------------------------------------------------
// shell
// ---------------------------------------------------------------------------

/// Runs `command` through `sh -c`. A non-zero exit is a failure that still
/// reports the captured streams.
pub struct ShellAction;

impl ShellAction {
    async fn run(request: &ActionRequest) -> Result<ActionOutcome, ActionOutcome> {
        let command = required_str(request, "command")?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = str_param(&request.params, "cwd") {
            cmd.current_dir(expand_tilde(cwd));
        }
        if let Some(env) = request.params.get("env").and_then(Value::as_object) {
            for (key, value) in env {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                cmd.env(key, value);
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ActionOutcome::failed(format!("failed to spawn shell: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Some(input) = str_param(&request.params, "stdin") {
                stdin.write_all(input.as_bytes()).await.ok();
            }
            // Dropping stdin closes the pipe and signals EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ActionOutcome::failed(format!("failed to wait for shell: {e}")))?;

        let exit_code = output.status.code();
        let result = json!({
            "stdout": String::from_utf8_lossy(&output.stdout).trim_end(),
            "stderr": String::from_utf8_lossy(&output.stderr).trim_end(),
            "exit_code": exit_code,
        });

        tracing::debug!(
            step_id = request.step_id.as_str(),
            ?exit_code,
            "shell action finished"
        );

        if output.status.success() {
            Ok(ActionOutcome::ok(result))
        } else {
            Ok(ActionOutcome {
                success: false,
                output: result,
                error: Some(match exit_code {
                    Some(code) => format!("command exited with status {code}"),
                    None => "command terminated by signal".to_string(),
                }),
            })
        }
    }
}

impl ActionExecutor for ShellAction {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        Box::pin(async move { Self::run(&request).await.unwrap_or_else(|failed| failed) })
    }
}

// ---------------------------------------------------------------------------
// file_read / file_write
// ---------------------------------------------------------------------------

pub struct FileReadAction;

impl ActionExecutor for FileReadAction {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        Box::pin(async move {
            let path = match required_str(&request, "path") {
                Ok(path) => expand_tilde(path),
                Err(failed) => return failed,
            };
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => ActionOutcome::ok(json!({
                    "path": path.display().to_string(),
                    "bytes": content.len(),
                    "content": content,
                })),
                Err(e) => ActionOutcome::failed(format!("failed to read {}: {e}", path.display())),
            }
        })
    }
}

/// Writes `content` (strings verbatim, other JSON pretty-printed), creating
/// parent directories as needed.
pub struct FileWriteAction;

impl FileWriteAction {
    async fn write(path: &std::path::Path, content: &str, append: bool) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        } else {
            tokio::fs::write(path, content).await
        }
    }
}

impl ActionExecutor for FileWriteAction {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        Box::pin(async move {
            let path = match required_str(&request, "path") {
                Ok(path) => expand_tilde(path),
                Err(failed) => return failed,
            };
            let content = match request.params.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
            };
            let append = request
                .params
                .get("append")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            match Self::write(&path, &content, append).await {
                Ok(()) => ActionOutcome::ok(json!({
                    "path": path.display().to_string(),
                    "bytes": content.len(),
                })),
                Err(e) => ActionOutcome::failed(format!("failed to write {}: {e}", path.display())),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// http_request
// ---------------------------------------------------------------------------

/// Makes one HTTP request. Responses with a 4xx/5xx status are failures
/// that still carry the response as output.
pub struct HttpRequestAction {
    client: reqwest::Client,
}

impl HttpRequestAction {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("cadence/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionOutcome> {
        let url = required_str(request, "url")?;
        let method = str_param(&request.params, "method").unwrap_or("GET");
        let http_method: reqwest::Method = method
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| ActionOutcome::failed(format!("invalid HTTP method: {method}")))?;

        let mut builder = self.client.request(http_method, url);
        if let Some(headers) = request.params.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    builder = builder.header(key.as_str(), value);
                }
            }
        }
        builder = match request.params.get("body") {
            None | Some(Value::Null) => builder,
            Some(Value::String(s)) => builder.body(s.clone()),
            Some(other) => builder.json(other),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ActionOutcome::failed(format!("HTTP request to '{url}' failed: {e}")))?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| ActionOutcome::failed(format!("failed to read HTTP response body: {e}")))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        tracing::info!(url, status = status.as_u16(), "HTTP action completed");

        let output = json!({
            "status": status.as_u16(),
            "headers": headers,
            "body": body,
        });
        if status.is_client_error() || status.is_server_error() {
            Ok(ActionOutcome {
                success: false,
                output,
                error: Some(format!("HTTP {status}")),
            })
        } else {
            Ok(ActionOutcome::ok(output))
        }
    }
}

impl ActionExecutor for HttpRequestAction {
    fn execute(&self, request: ActionRequest) -> HandlerFuture<'_, ActionOutcome> {
        Box::pin(async move { self.send(&request).await.unwrap_or_else(|failed| failed) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(action_type: &str, params: Value) -> ActionRequest {
        ActionRequest {
            execution_id: Uuid::now_v7(),
            step_id: "step".to_string(),
            action_type: action_type.to_string(),
            params,
        }
    }

    async fn run(action_type: &str, params: Value) -> ActionOutcome {
        let registry = builtin_actions().unwrap();
        let executor = registry.get(action_type).unwrap();
        executor.execute(request(action_type, params)).await
    }

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_actions().unwrap();
        assert_eq!(
            registry.action_types(),
            vec!["echo", "file_read", "file_write", "http_request", "log", "shell"]
        );
    }

    #[tokio::test]
    async fn test_echo_returns_params() {
        let outcome = run("echo", json!({"x": 42})).await;
        assert!(outcome.success);
        assert_eq!(outcome.output, json!({"x": 42}));
    }

    #[tokio::test]
    async fn test_log_reports_message() {
        let outcome = run("log", json!({"message": "disk ok", "level": "warn"})).await;
        assert!(outcome.success);
        assert_eq!(outcome.output["logged"], "disk ok");

        let outcome = run("log", json!("bare string")).await;
        assert_eq!(outcome.output["logged"], "bare string");
    }

    #[tokio::test]
    async fn test_shell_captures_stdout_and_env() {
        let outcome = run(
            "shell",
            json!({"command": "echo \"$GREETING world\"", "env": {"GREETING": "hello"}}),
        )
        .await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.output["stdout"], "hello world");
        assert_eq!(outcome.output["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_shell_nonzero_exit_fails_with_output() {
        let outcome = run("shell", json!({"command": "echo oops >&2; exit 3"})).await;
        assert!(!outcome.success);
        assert_eq!(outcome.output["exit_code"], 3);
        assert_eq!(outcome.output["stderr"], "oops");
        assert_eq!(outcome.error.as_deref(), Some("command exited with status 3"));
    }

    #[tokio::test]
    async fn test_shell_requires_command() {
        let outcome = run("shell", json!({})).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("'command'"));
    }

    #[tokio::test]
    async fn test_file_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        let path_str = path.display().to_string();

        let outcome = run("file_write", json!({"path": path_str, "content": "line1\n"})).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.output["bytes"], 6);

        let outcome = run(
            "file_write",
            json!({"path": path_str, "content": "line2\n", "append": true}),
        )
        .await;
        assert!(outcome.success);

        let outcome = run("file_read", json!({"path": path_str})).await;
        assert!(outcome.success);
        assert_eq!(outcome.output["content"], "line1\nline2\n");
    }

    #[tokio::test]
    async fn test_file_write_serializes_json_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let outcome = run(
            "file_write",
            json!({"path": path.display().to_string(), "content": {"a": 1}}),
        )
        .await;
        assert!(outcome.success);
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(serde_json::from_str::<Value>(&written).unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_file_read_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let outcome = run("file_read", json!({"path": path.display().to_string()})).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("failed to read"));
    }

    #[tokio::test]
    async fn test_http_request_rejects_bad_input_without_network() {
        let outcome = run("http_request", json!({"method": "GET"})).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("'url'"));

        let outcome = run(
            "http_request",
            json!({"url": "http://127.0.0.1:9/", "method": "NOT A METHOD"}),
        )
        .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("invalid HTTP method"));
    }
}
