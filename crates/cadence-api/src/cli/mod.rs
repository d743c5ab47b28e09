//! CLI command definitions for the `cadence` binary.
//!
//! Uses clap derive macros for argument parsing. Workflows can be named by
//! id or by (unique) name wherever a `<WORKFLOW>` argument is taken.

pub mod display;
pub mod prompt;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Run and manage automation workflows.
#[derive(Parser)]
#[command(name = "cadence", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "CADENCE_LOG_JSON")]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "CADENCE_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored workflows.
    #[command(alias = "ls")]
    List,

    /// Show a workflow's triggers and steps.
    Show {
        /// Workflow id or name.
        workflow: String,
    },

    /// Create an empty workflow with a manual trigger.
    Create {
        /// Workflow name (prompted if omitted).
        #[arg(long)]
        name: Option<String>,

        /// Short description.
        #[arg(long)]
        description: Option<String>,

        /// Tags (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Import a workflow document (YAML or JSON).
    Import {
        /// Path to the document; `-` reads stdin.
        file: PathBuf,
    },

    /// Export a workflow document.
    Export {
        /// Workflow id or name.
        workflow: String,

        /// Document format.
        #[arg(long, value_enum, default_value = "yaml")]
        format: ExportFormat,

        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a workflow permanently.
    #[command(alias = "rm")]
    Delete {
        /// Workflow id or name.
        workflow: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Copy a workflow under a new id.
    Duplicate {
        /// Workflow id or name.
        workflow: String,

        /// Name for the copy (default: "<name> (copy)").
        #[arg(long)]
        name: Option<String>,
    },

    /// Enable a workflow's triggers.
    Enable {
        /// Workflow id or name.
        workflow: String,
    },

    /// Disable a workflow's triggers (manual runs still work).
    Disable {
        /// Workflow id or name.
        workflow: String,
    },

    /// Run a workflow now and wait for it to finish.
    Run {
        /// Workflow id or name.
        workflow: String,

        /// Input variable as KEY=VALUE; VALUE is parsed as JSON when possible.
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Input variables as one JSON object (merged before --input).
        #[arg(long, value_name = "JSON")]
        inputs_json: Option<String>,

        /// Never prompt; `input` steps fall back to their defaults.
        #[arg(long)]
        no_input: bool,
    },

    /// Fire a named event and wait for the workflows it launches.
    Event {
        /// Event name.
        name: String,

        /// Event payload as JSON.
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },

    /// Show execution history from a running `cadence serve`.
    History {
        /// Only executions of this workflow id.
        workflow: Option<String>,

        /// Show one execution with its step results.
        #[arg(long, value_name = "ID")]
        execution: Option<String>,

        /// Maximum number of executions to list.
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Server base URL (default: from config.toml).
        #[arg(long, env = "CADENCE_SERVER")]
        server: Option<String>,
    },

    /// Start the REST API server with every trigger armed.
    Serve {
        /// Port to listen on (default: from config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default: from config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_inputs() {
        let cli = Cli::try_parse_from([
            "cadence", "--json", "run", "backup", "-i", "x=21", "--input", "dry=true", "--no-input",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run {
                workflow,
                inputs,
                no_input,
                ..
            } => {
                assert_eq!(workflow, "backup");
                assert_eq!(inputs, vec!["x=21", "dry=true"]);
                assert!(no_input);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_export_format() {
        let cli = Cli::try_parse_from(["cadence", "export", "nightly", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Export {
                format: ExportFormat::Json,
                ..
            }
        ));
    }
}
