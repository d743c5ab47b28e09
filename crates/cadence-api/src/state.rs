//! Application state wiring the engine to its infrastructure.
//!
//! AppState holds the workflow manager used by both CLI commands and REST
//! API handlers. The manager is generic over its repository; AppState pins
//! it to the YAML store under the data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cadence_core::workflow::handlers::StepHandlers;
use cadence_core::workflow::manager::WorkflowManager;
use cadence_infra::config::{load_engine_config, resolve_workflow_dir};
use cadence_infra::filesystem::{resolve_data_dir, YamlWorkflowRepository};
use cadence_infra::workflow::actions::builtin_actions;
use cadence_types::config::EngineConfig;

use crate::cli::prompt::{ConsoleNotifier, TerminalInput};

/// Workflow manager pinned to the YAML store.
pub type Manager = WorkflowManager<YamlWorkflowRepository>;

/// How the process hosts the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Long-running `serve`: every trigger is armed.
    Server,
    /// A single CLI command: no schedule/condition timers, and `input`
    /// steps prompt on the terminal when `interactive` is set.
    OneShot { interactive: bool },
}

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Manager,
    pub config: Arc<EngineConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load config, and load every stored workflow.
    pub async fn init(mode: HostMode) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_engine_config(&data_dir).await;
        Self::build(&data_dir, config, mode).await
    }

    /// Wire the manager for an explicit data directory and config.
    pub async fn build(data_dir: &Path, config: EngineConfig, mode: HostMode) -> anyhow::Result<Self> {
        let workflow_dir = resolve_workflow_dir(&config, data_dir);
        let repo = YamlWorkflowRepository::new(workflow_dir.clone());

        let mut handlers = StepHandlers::new(builtin_actions()?);
        if let HostMode::OneShot { interactive } = mode {
            handlers = handlers.with_notifier(Arc::new(ConsoleNotifier));
            if interactive {
                handlers = handlers.with_input(Arc::new(TerminalInput));
            }
        }

        let manager = WorkflowManager::new(repo, config.clone(), handlers);
        if mode != HostMode::Server {
            manager.set_timers_enabled(false);
        }
        let count = manager.load_all_workflows().await?;
        tracing::debug!(count, dir = %workflow_dir.display(), "workflow store ready");

        Ok(Self {
            manager,
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
        })
    }
}
