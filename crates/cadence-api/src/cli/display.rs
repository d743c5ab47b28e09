//! Table and detail rendering shared by the CLI commands.

use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use cadence_types::workflow::{
    ExecutionStatus, StepStatus, TriggerConfig, Workflow, WorkflowExecution, WorkflowStep,
};

pub fn status_color(status: ExecutionStatus) -> Color {
    match status {
        ExecutionStatus::Completed => Color::Green,
        ExecutionStatus::Failed => Color::Red,
        ExecutionStatus::Cancelled => Color::DarkGrey,
        ExecutionStatus::Paused => Color::Yellow,
        ExecutionStatus::Pending | ExecutionStatus::Running => Color::Cyan,
    }
}

pub fn styled_status(status: ExecutionStatus) -> String {
    let text = status.as_str();
    match status {
        ExecutionStatus::Completed => style(text).green().to_string(),
        ExecutionStatus::Failed => style(text).red().to_string(),
        ExecutionStatus::Paused => style(text).yellow().to_string(),
        ExecutionStatus::Cancelled => style(text).dim().to_string(),
        ExecutionStatus::Pending | ExecutionStatus::Running => style(text).cyan().to_string(),
    }
}

fn step_status_cell(status: StepStatus) -> Cell {
    match status {
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
        StepStatus::Skipped => Cell::new("skipped").fg(Color::DarkGrey),
    }
}

fn base_table(header: Vec<Cell>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// One-line summary of a trigger for tables.
pub fn describe_trigger(config: &TriggerConfig) -> String {
    match config {
        TriggerConfig::Manual {} => "manual".to_string(),
        TriggerConfig::Schedule {
            cron, interval_ms, ..
        } => match (cron, interval_ms) {
            (Some(cron), Some(ms)) => format!("schedule: cron '{cron}', every {ms}ms"),
            (Some(cron), None) => format!("schedule: cron '{cron}'"),
            (None, Some(ms)) => format!("schedule: every {ms}ms"),
            (None, None) => "schedule".to_string(),
        },
        TriggerConfig::Event { event_name, filter } if filter.is_empty() => {
            format!("event: {event_name}")
        }
        TriggerConfig::Event { event_name, filter } => {
            format!("event: {event_name} ({} filters)", filter.len())
        }
        TriggerConfig::Condition { conditions, logic } => {
            format!("condition: {} ({logic:?})", conditions.len())
        }
        TriggerConfig::Webhook { path, methods, secret } => format!(
            "webhook: {} {}{}",
            methods.join("|"),
            path,
            if secret.is_some() { " (signed)" } else { "" }
        ),
        TriggerConfig::Hotkey { keys } => format!("hotkey: {keys}"),
    }
}

pub fn workflow_table(workflows: &[Workflow]) -> Table {
    let mut table = base_table(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("ID"),
        Cell::new("Enabled"),
        Cell::new("Steps"),
        Cell::new("Triggers"),
        Cell::new("Updated"),
    ]);
    for wf in workflows {
        let triggers: Vec<String> = wf
            .triggers
            .iter()
            .map(|t| t.config.trigger_type().to_string())
            .collect();
        table.add_row(vec![
            Cell::new(&wf.metadata.name).fg(Color::Cyan),
            Cell::new(wf.metadata.id),
            if wf.metadata.enabled {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no").fg(Color::DarkGrey)
            },
            Cell::new(wf.steps.len()),
            Cell::new(triggers.join(", ")),
            Cell::new(wf.metadata.updated_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    table
}

fn push_step_rows(rows: &mut Vec<(String, String, String)>, steps: &[WorkflowStep], depth: usize) {
    for step in steps {
        let indent = "  ".repeat(depth);
        let mut name = format!("{indent}{}", step.name);
        if !step.enabled {
            name.push_str(" (disabled)");
        }
        rows.push((
            format!("{indent}{}", step.id),
            name,
            step.config.kind_name().to_string(),
        ));
        for nested in step.config.child_step_lists() {
            push_step_rows(rows, nested, depth + 1);
        }
    }
}

/// Print a workflow's metadata, triggers, and (nested) steps.
pub fn print_workflow(wf: &Workflow) {
    let meta = &wf.metadata;
    println!();
    println!("  {}  {}", style("Name:").bold(), style(&meta.name).cyan());
    println!("  {}  {}", style("ID:").bold(), style(meta.id).dim());
    if let Some(description) = &meta.description {
        println!("  {}  {description}", style("Description:").bold());
    }
    println!("  {}  {}", style("Version:").bold(), meta.version);
    println!(
        "  {}  {}",
        style("Enabled:").bold(),
        if meta.enabled { "yes" } else { "no" }
    );
    if !meta.tags.is_empty() {
        println!("  {}  {}", style("Tags:").bold(), meta.tags.join(", "));
    }

    println!();
    println!("  {}", style("Triggers").bold().underlined());
    if wf.triggers.is_empty() {
        println!("    (none)");
    }
    for trigger in &wf.triggers {
        let marker = if trigger.enabled {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!("    {marker} {}", describe_trigger(&trigger.config));
    }

    if !wf.input_variables.is_empty() {
        println!();
        println!("  {}", style("Inputs").bold().underlined());
        for var in &wf.input_variables {
            let required = if var.required { " (required)" } else { "" };
            println!("    {}: {:?}{required}", var.name, var.var_type);
        }
    }

    println!();
    let mut rows = Vec::new();
    push_step_rows(&mut rows, &wf.steps, 0);
    if rows.is_empty() {
        println!("  No steps yet.");
    } else {
        let mut table = base_table(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Type"),
        ]);
        for (id, name, kind) in rows {
            table.add_row(vec![Cell::new(id), Cell::new(name), Cell::new(kind)]);
        }
        println!("{table}");
    }
    println!();
}

pub fn execution_table(executions: &[WorkflowExecution]) -> Table {
    let mut table = base_table(vec![
        Cell::new("Execution").fg(Color::Cyan),
        Cell::new("Workflow"),
        Cell::new("Trigger"),
        Cell::new("Status"),
        Cell::new("Started"),
        Cell::new("Duration"),
    ]);
    for ex in executions {
        table.add_row(vec![
            Cell::new(ex.id),
            Cell::new(&ex.workflow_name),
            Cell::new(ex.trigger_type),
            Cell::new(ex.status).fg(status_color(ex.status)),
            Cell::new(ex.started_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(format_duration(ex.duration_ms())),
        ]);
    }
    table
}

pub fn format_duration(ms: Option<i64>) -> String {
    match ms {
        None => "-".to_string(),
        Some(ms) if ms < 1000 => format!("{ms}ms"),
        Some(ms) if ms < 60_000 => format!("{:.1}s", ms as f64 / 1000.0),
        Some(ms) => format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000),
    }
}

/// Print one execution with its step results and outputs.
pub fn print_execution(ex: &WorkflowExecution) {
    println!();
    println!(
        "  {}  {} ({})",
        style("Workflow:").bold(),
        style(&ex.workflow_name).cyan(),
        ex.workflow_version
    );
    println!("  {}  {}", style("Execution:").bold(), style(ex.id).dim());
    println!("  {}  {}", style("Trigger:").bold(), ex.trigger_type);
    println!("  {}  {}", style("Status:").bold(), styled_status(ex.status));
    println!(
        "  {}  {}",
        style("Duration:").bold(),
        format_duration(ex.duration_ms())
    );
    if let Some(parent) = ex.parent_execution_id {
        println!("  {}  {parent}", style("Parent:").bold());
    }
    if let Some(error) = &ex.error {
        println!("  {}  {}", style("Error:").bold(), style(error).red());
    }

    if !ex.step_results.is_empty() {
        println!();
        let mut table = base_table(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Retries"),
            Cell::new("Took"),
            Cell::new("Detail"),
        ]);
        for result in &ex.step_results {
            let took = (result.completed_at - result.started_at).num_milliseconds();
            let detail = match (&result.error, &result.output) {
                (Some(error), _) => error.clone(),
                (None, Some(output)) => truncate(&output.to_string(), 60),
                (None, None) => String::new(),
            };
            table.add_row(vec![
                Cell::new(&result.step_id),
                Cell::new(&result.step_type),
                step_status_cell(result.status),
                Cell::new(result.retry_count),
                Cell::new(format_duration(Some(took))),
                Cell::new(detail),
            ]);
        }
        println!("{table}");
    }

    if !ex.outputs.is_empty() {
        println!();
        println!("  {}", style("Outputs").bold().underlined());
        for (key, value) in &ex.outputs {
            println!("    {key} = {value}");
        }
    }
    println!();
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}
