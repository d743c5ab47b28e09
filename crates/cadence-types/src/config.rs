//! Engine configuration types for Cadence.
//!
//! `EngineConfig` represents the top-level `config.toml` that controls
//! admission limits, timeouts, polling intervals and the HTTP listener.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the workflow engine.
///
/// Loaded from `~/.cadence/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one YAML record per workflow. `~` expands to home.
    #[serde(default = "default_workflow_dir")]
    pub workflow_dir: String,

    /// Launches are rejected while this many executions are active.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,

    /// Step timeout when neither the step nor its workflow sets one.
    #[serde(default = "default_step_timeout_ms")]
    pub default_step_timeout_ms: u64,

    /// Loop iteration bound when a loop step does not set `max_iterations`.
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: u64,

    /// Polling period for `condition` triggers.
    #[serde(default = "default_condition_trigger_interval_ms")]
    pub condition_trigger_interval_ms: u64,

    /// Polling period for condition waits inside `wait` steps.
    #[serde(default = "default_condition_poll_interval_ms")]
    pub condition_poll_interval_ms: u64,

    /// Upper bound on event and condition waits.
    #[serde(default = "default_wait_safety_timeout_ms")]
    pub wait_safety_timeout_ms: u64,

    /// Finished executions retained for history queries.
    #[serde(default = "default_max_execution_history")]
    pub max_execution_history: usize,

    /// Allow `script` steps to run.
    #[serde(default = "default_scripts_enabled")]
    pub scripts_enabled: bool,

    /// Buffer size of the lifecycle event broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_workflow_dir() -> String {
    "~/.cadence/workflows".to_string()
}

fn default_max_concurrent_executions() -> usize {
    5
}

fn default_step_timeout_ms() -> u64 {
    300_000
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_condition_trigger_interval_ms() -> u64 {
    5_000
}

fn default_condition_poll_interval_ms() -> u64 {
    1_000
}

fn default_wait_safety_timeout_ms() -> u64 {
    300_000
}

fn default_max_execution_history() -> usize {
    500
}

fn default_scripts_enabled() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_dir: default_workflow_dir(),
            max_concurrent_executions: default_max_concurrent_executions(),
            default_step_timeout_ms: default_step_timeout_ms(),
            default_max_iterations: default_max_iterations(),
            condition_trigger_interval_ms: default_condition_trigger_interval_ms(),
            condition_poll_interval_ms: default_condition_poll_interval_ms(),
            wait_safety_timeout_ms: default_wait_safety_timeout_ms(),
            max_execution_history: default_max_execution_history(),
            scripts_enabled: default_scripts_enabled(),
            event_channel_capacity: default_event_channel_capacity(),
            server: ServerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn default_step_timeout(&self) -> Duration {
        Duration::from_millis(self.default_step_timeout_ms)
    }

    pub fn condition_trigger_interval(&self) -> Duration {
        Duration::from_millis(self.condition_trigger_interval_ms)
    }

    pub fn condition_poll_interval(&self) -> Duration {
        Duration::from_millis(self.condition_poll_interval_ms)
    }

    pub fn wait_safety_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_safety_timeout_ms)
    }
}

/// HTTP listener settings for `cadence serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_executions, 5);
        assert_eq!(config.default_max_iterations, 1000);
        assert_eq!(config.wait_safety_timeout(), Duration::from_secs(300));
        assert!(config.scripts_enabled);
        assert_eq!(config.server.port, 7878);
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.workflow_dir, "~/.cadence/workflows");
        assert_eq!(config.condition_trigger_interval_ms, 5_000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
workflow_dir = "/srv/cadence/workflows"
max_concurrent_executions = 1
scripts_enabled = false

[server]
port = 9000
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workflow_dir, "/srv/cadence/workflows");
        assert_eq!(config.max_concurrent_executions, 1);
        assert!(!config.scripts_enabled);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.default_step_timeout_ms, 300_000);
    }
}
