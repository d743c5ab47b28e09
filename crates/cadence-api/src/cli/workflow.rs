//! Workflow CLI commands: list, show, create, import, export, delete,
//! duplicate, enable/disable, run, event, and history.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast;
use uuid::Uuid;

use cadence_core::workflow::definition::{parse_workflow_json, parse_workflow_yaml, serialize_workflow_yaml};
use cadence_core::workflow::manager::{CreateWorkflowOptions, TriggerOutcome};
use cadence_types::event::WorkflowEvent;
use cadence_types::workflow::{TriggerType, Variables, Workflow, WorkflowExecution};

use crate::cli::display;
use crate::cli::ExportFormat;
use crate::state::AppState;

/// Poll period while waiting for event-launched executions.
const EXECUTION_POLL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Find a workflow by id, or by exact (unique) name.
pub async fn resolve_workflow(state: &AppState, target: &str) -> Result<Workflow> {
    if let Ok(id) = target.parse::<Uuid>() {
        return state
            .manager
            .get_workflow(id)
            .await
            .with_context(|| format!("Workflow '{target}' not found"));
    }

    let mut matches: Vec<Workflow> = state
        .manager
        .list_workflows()
        .await
        .into_iter()
        .filter(|w| w.metadata.name == target)
        .collect();
    match matches.len() {
        0 => bail!("Workflow '{target}' not found"),
        1 => Ok(matches.remove(0)),
        n => bail!("{n} workflows are named '{target}'; use the id instead"),
    }
}

/// Build launch inputs from an optional JSON object and `KEY=VALUE` pairs.
///
/// Values that parse as JSON keep their type (`x=21` is a number); anything
/// else is taken as a string.
pub fn parse_inputs(inputs_json: Option<&str>, pairs: &[String]) -> Result<Variables> {
    let mut inputs = match inputs_json {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("Invalid --inputs-json")? {
            Value::Object(map) => map,
            _ => bail!("--inputs-json must be a JSON object"),
        },
        None => Variables::new(),
    };

    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Invalid input '{pair}': expected KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid input '{pair}': empty key");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        inputs.insert(key.to_string(), value);
    }
    Ok(inputs)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

pub async fn list(state: &AppState, json: bool) -> Result<()> {
    let workflows = state.manager.list_workflows().await;

    if json {
        return print_json(&workflows);
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows yet.");
        println!(
            "  Create one with: {}",
            style("cadence import <file.yaml>").dim()
        );
        println!();
        return Ok(());
    }

    println!("{}", display::workflow_table(&workflows));
    Ok(())
}

pub async fn show(state: &AppState, target: &str, json: bool) -> Result<()> {
    let workflow = resolve_workflow(state, target).await?;
    if json {
        return print_json(&workflow);
    }
    display::print_workflow(&workflow);
    Ok(())
}

pub async fn create(
    state: &AppState,
    name: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    json: bool,
) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => Input::<String>::new()
            .with_prompt("Workflow name")
            .interact_text()?,
    };

    let workflow = state
        .manager
        .create_workflow(
            name,
            description,
            CreateWorkflowOptions {
                tags,
                ..CreateWorkflowOptions::default()
            },
        )
        .await?;

    if json {
        return print_json(&workflow);
    }

    println!();
    println!(
        "  {} Created workflow '{}'",
        style("✓").green().bold(),
        style(&workflow.metadata.name).cyan()
    );
    println!("  ID: {}", style(workflow.metadata.id).dim());
    println!(
        "  Add steps by editing the export: {}",
        style(format!("cadence export {} -o flow.yaml", workflow.metadata.id)).dim()
    );
    println!();
    Ok(())
}

async fn read_document(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

/// Parse a workflow document, choosing JSON by extension or leading brace.
pub fn parse_document(file: &Path, content: &str) -> Result<Workflow> {
    let is_json = match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case("json"),
        None => content.trim_start().starts_with('{'),
    };
    let parsed = if is_json {
        parse_workflow_json(content)
    } else {
        parse_workflow_yaml(content)
    };
    parsed.with_context(|| format!("Invalid workflow document {}", file.display()))
}

pub async fn import(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let content = read_document(file).await?;
    let workflow = parse_document(file, &content)?;
    let original_id = workflow.metadata.id;
    let stored = state.manager.import_workflow(workflow).await?;

    if json {
        return print_json(&stored);
    }

    println!();
    println!(
        "  {} Imported workflow '{}'",
        style("✓").green().bold(),
        style(&stored.metadata.name).cyan()
    );
    println!("  ID: {}", style(stored.metadata.id).dim());
    if stored.metadata.id != original_id {
        println!(
            "  {}",
            style(format!("(id {original_id} was taken; a new one was assigned)")).yellow()
        );
    }
    println!("  Steps: {}  Triggers: {}", stored.steps.len(), stored.triggers.len());
    println!();
    Ok(())
}

pub async fn export(
    state: &AppState,
    target: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let workflow = resolve_workflow(state, target).await?;
    let document = match format {
        ExportFormat::Yaml => serialize_workflow_yaml(&workflow)?,
        ExportFormat::Json => serde_json::to_string_pretty(&workflow)? + "\n",
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, document)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "  {} Exported '{}' to {}",
                style("✓").green().bold(),
                workflow.metadata.name,
                path.display()
            );
        }
        None => print!("{document}"),
    }
    Ok(())
}

pub async fn delete(state: &AppState, target: &str, force: bool, json: bool) -> Result<()> {
    let workflow = resolve_workflow(state, target).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete workflow '{}' ({})? This cannot be undone",
                workflow.metadata.name, workflow.metadata.id
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let deleted = state.manager.delete_workflow(workflow.metadata.id).await?;

    if json {
        return print_json(&serde_json::json!({
            "deleted": true,
            "id": deleted.metadata.id,
        }));
    }
    println!(
        "  {} Deleted workflow '{}'",
        style("✓").green().bold(),
        deleted.metadata.name
    );
    Ok(())
}

pub async fn duplicate(state: &AppState, target: &str, name: Option<String>, json: bool) -> Result<()> {
    let source = resolve_workflow(state, target).await?;
    let copy = state
        .manager
        .duplicate_workflow(source.metadata.id, name)
        .await?;

    if json {
        return print_json(&copy);
    }
    println!(
        "  {} Duplicated '{}' as '{}' ({})",
        style("✓").green().bold(),
        source.metadata.name,
        style(&copy.metadata.name).cyan(),
        style(copy.metadata.id).dim()
    );
    Ok(())
}

pub async fn set_enabled(state: &AppState, target: &str, enabled: bool, json: bool) -> Result<()> {
    let workflow = resolve_workflow(state, target).await?;
    let updated = state
        .manager
        .set_enabled(workflow.metadata.id, enabled)
        .await?;

    if json {
        return print_json(&updated);
    }
    println!(
        "  {} Workflow '{}' {}",
        style("✓").green().bold(),
        updated.metadata.name,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// Print step progress for one execution until it finishes.
async fn follow_progress(mut events: broadcast::Receiver<WorkflowEvent>, execution_id: Uuid) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        };
        if event.execution_id() != Some(execution_id) {
            continue;
        }
        match event {
            WorkflowEvent::StepStarted {
                step_id, step_type, ..
            } => {
                eprintln!("  {} {step_id} {}", style("→").cyan(), style(step_type).dim());
            }
            WorkflowEvent::StepCompleted {
                step_id, duration_ms, ..
            } => {
                eprintln!(
                    "  {} {step_id} {}",
                    style("✓").green(),
                    style(display::format_duration(Some(duration_ms as i64))).dim()
                );
            }
            WorkflowEvent::StepFailed {
                step_id,
                error,
                will_retry,
                ..
            } => {
                let note = if will_retry { " (retrying)" } else { "" };
                eprintln!("  {} {step_id}: {error}{note}", style("✗").red());
            }
            WorkflowEvent::ExecutionPaused { .. } => {
                eprintln!("  {} paused", style("‖").yellow());
            }
            WorkflowEvent::ExecutionCompleted { .. }
            | WorkflowEvent::ExecutionFailed { .. }
            | WorkflowEvent::ExecutionCancelled { .. } => return,
            _ => {}
        }
    }
}

pub async fn run(
    state: &AppState,
    target: &str,
    inputs_json: Option<&str>,
    pairs: &[String],
    show_progress: bool,
    json: bool,
) -> Result<()> {
    let workflow = resolve_workflow(state, target).await?;
    let inputs = parse_inputs(inputs_json, pairs)?;

    let events = state.manager.subscribe();
    let handle = state
        .manager
        .start_workflow(workflow.metadata.id, inputs, TriggerType::Manual)
        .await?;

    let progress = show_progress.then(|| tokio::spawn(follow_progress(events, handle.execution_id)));
    let execution = handle.wait().await?;
    if let Some(progress) = progress {
        progress.abort();
    }

    if json {
        print_json(&execution)?;
    } else {
        display::print_execution(&execution);
    }

    if execution.status != cadence_types::workflow::ExecutionStatus::Completed {
        bail!(
            "execution {} {}",
            execution.id,
            execution.error.as_deref().unwrap_or(execution.status.as_str())
        );
    }
    Ok(())
}

async fn wait_for_terminal(state: &AppState, execution_id: Uuid) -> Result<WorkflowExecution> {
    loop {
        let execution = state.manager.get_execution(execution_id).await?;
        if execution.status.is_terminal() {
            return Ok(execution);
        }
        tokio::time::sleep(EXECUTION_POLL).await;
    }
}

pub async fn event(state: &AppState, name: &str, data: Option<&str>, json: bool) -> Result<()> {
    let payload = match data {
        Some(raw) => serde_json::from_str(raw).context("Invalid --data JSON")?,
        None => Value::Null,
    };

    let outcomes: Vec<TriggerOutcome> = state.manager.trigger_event(name, payload).await;
    let mut executions = Vec::new();
    for outcome in &outcomes {
        if let Some(execution_id) = outcome.execution_id {
            executions.push(wait_for_terminal(state, execution_id).await?);
        }
    }

    if json {
        return print_json(&serde_json::json!({
            "event": name,
            "outcomes": outcomes,
            "executions": executions,
        }));
    }

    if outcomes.is_empty() {
        println!("  No workflow is listening for '{name}'.");
        return Ok(());
    }
    for outcome in outcomes.iter().filter(|o| !o.executed) {
        println!(
            "  {} {} not launched: {}",
            style("!").yellow().bold(),
            outcome.workflow_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    if !executions.is_empty() {
        println!("{}", display::execution_table(&executions));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// History (from a running server)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    code: String,
    message: String,
}

/// Base URL of the local server as configured.
pub fn default_server_url(state: &AppState) -> String {
    let host = match state.config.server.host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        host => host,
    };
    format!("http://{host}:{}", state.config.server.port)
}

async fn fetch<T: serde::de::DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Cannot reach {url} (is `cadence serve` running?)"))?;
    let envelope: Envelope<T> = response.json().await.context("Unexpected server response")?;
    if let Some(error) = envelope.errors.first() {
        bail!("{}: {}", error.code, error.message);
    }
    envelope
        .data
        .ok_or_else(|| anyhow::anyhow!("Server returned no data"))
}

pub async fn history(
    state: &AppState,
    workflow: Option<&str>,
    execution: Option<&str>,
    limit: usize,
    server: Option<&str>,
    json: bool,
) -> Result<()> {
    let base = server
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default_server_url(state));
    let client = reqwest::Client::new();

    if let Some(execution_id) = execution {
        let execution_id: Uuid = execution_id.parse().context("Invalid execution id")?;
        let execution: WorkflowExecution =
            fetch(&client, &format!("{base}/api/v1/executions/{execution_id}")).await?;
        if json {
            return print_json(&execution);
        }
        display::print_execution(&execution);
        return Ok(());
    }

    let mut url = format!("{base}/api/v1/executions?limit={limit}");
    if let Some(target) = workflow {
        let id = match target.parse::<Uuid>() {
            Ok(id) => id,
            Err(_) => resolve_workflow(state, target).await?.metadata.id,
        };
        url.push_str(&format!("&workflow_id={id}"));
    }

    let executions: Vec<WorkflowExecution> = fetch(&client, &url).await?;
    if json {
        return print_json(&executions);
    }
    if executions.is_empty() {
        println!("  No executions recorded.");
        return Ok(());
    }
    println!("{}", display::execution_table(&executions));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::config::EngineConfig;
    use serde_json::json;

    use crate::state::HostMode;

    async fn state(dir: &Path) -> AppState {
        AppState::build(dir, EngineConfig::default(), HostMode::OneShot { interactive: false })
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_inputs_types_and_precedence() {
        let inputs = parse_inputs(
            Some(r#"{"x": 1, "name": "a"}"#),
            &["x=21".to_string(), "flag=true".to_string(), "path=/tmp/out".to_string()],
        )
        .unwrap();
        assert_eq!(inputs["x"], json!(21));
        assert_eq!(inputs["flag"], json!(true));
        assert_eq!(inputs["path"], json!("/tmp/out"));
        assert_eq!(inputs["name"], json!("a"));
    }

    #[test]
    fn test_parse_inputs_rejects_bad_pairs() {
        assert!(parse_inputs(None, &["novalue".to_string()]).is_err());
        assert!(parse_inputs(None, &["=1".to_string()]).is_err());
        assert!(parse_inputs(Some("[1]"), &[]).is_err());
    }

    #[test]
    fn test_parse_document_by_extension_and_content() {
        let yaml = "metadata:\n  id: 01926f4e-8c4a-7b2e-9a1d-3f5e6a7b8c9d\n  name: y\n  created_at: 2026-01-05T08:00:00Z\n  updated_at: 2026-01-05T08:00:00Z\n";
        let wf = parse_document(Path::new("flow.yaml"), yaml).unwrap();
        assert_eq!(wf.metadata.name, "y");

        let json_doc = r#"{"metadata": {"id": "01926f4e-8c4a-7b2e-9a1d-3f5e6a7b8c9d", "name": "j",
            "created_at": "2026-01-05T08:00:00Z", "updated_at": "2026-01-05T08:00:00Z"}}"#;
        let wf = parse_document(Path::new("-"), json_doc).unwrap();
        assert_eq!(wf.metadata.name, "j");
        assert!(parse_document(Path::new("flow.json"), yaml).is_err());
    }

    #[tokio::test]
    async fn test_resolve_by_id_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let a = state
            .manager
            .create_workflow("nightly", None, CreateWorkflowOptions::default())
            .await
            .unwrap();

        assert_eq!(resolve_workflow(&state, "nightly").await.unwrap().metadata.id, a.metadata.id);
        assert_eq!(
            resolve_workflow(&state, &a.metadata.id.to_string()).await.unwrap().metadata.id,
            a.metadata.id
        );
        assert!(resolve_workflow(&state, "missing").await.is_err());

        state
            .manager
            .duplicate_workflow(a.metadata.id, Some("nightly".to_string()))
            .await
            .unwrap();
        let err = resolve_workflow(&state, "nightly").await.unwrap_err();
        assert!(err.to_string().contains("use the id"));
    }

    #[tokio::test]
    async fn test_event_waits_for_launched_execution() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let doc = r#"
metadata:
  id: 01926f4e-8c4a-7b2e-9a1d-3f5e6a7b8c9d
  name: on-deploy
  created_at: 2026-01-05T08:00:00Z
  updated_at: 2026-01-05T08:00:00Z
triggers:
  - config:
      type: event
      event_name: deploy
steps:
  - id: say
    name: Say
    config:
      type: action
      action_type: echo
      params: { service: "{{event.data.service}}" }
"#;
        let wf = parse_document(Path::new("flow.yaml"), doc).unwrap();
        state.manager.import_workflow(wf).await.unwrap();

        let outcomes = state
            .manager
            .trigger_event("deploy", json!({"service": "api"}))
            .await;
        assert_eq!(outcomes.len(), 1);
        let execution = wait_for_terminal(&state, outcomes[0].execution_id.unwrap())
            .await
            .unwrap();
        assert_eq!(execution.status, cadence_types::workflow::ExecutionStatus::Completed);
        assert_eq!(execution.step_results[0].output, Some(json!({"service": "api"})));
    }
}
