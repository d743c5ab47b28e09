//! Engine configuration loader for Cadence.
//!
//! Reads `config.toml` from the data directory (`~/.cadence/` in production)
//! and deserializes it into [`EngineConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed.

use std::path::{Path, PathBuf};

use cadence_types::config::EngineConfig;

use crate::filesystem::expand_tilde;

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

/// Resolve where workflow records live.
///
/// A configured directory wins (with `~` expanded); a config that still
/// carries the stock default is re-rooted under `data_dir` so that
/// `CADENCE_DATA_DIR` moves workflows along with the config.
pub fn resolve_workflow_dir(config: &EngineConfig, data_dir: &Path) -> PathBuf {
    if config.workflow_dir == EngineConfig::default().workflow_dir {
        return data_dir.join("workflows");
    }
    expand_tilde(&config.workflow_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_engine_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrent_executions, 5);
        assert!(config.scripts_enabled);
    }

    #[tokio::test]
    async fn load_engine_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
max_concurrent_executions = 2
default_step_timeout_ms = 1500
scripts_enabled = false

[server]
port = 8181
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrent_executions, 2);
        assert_eq!(config.default_step_timeout_ms, 1500);
        assert!(!config.scripts_enabled);
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.max_execution_history, 500);
    }

    #[tokio::test]
    async fn load_engine_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrent_executions, 5);
    }

    #[test]
    fn resolve_workflow_dir_defaults_under_data_dir() {
        let config = EngineConfig::default();
        let dir = resolve_workflow_dir(&config, Path::new("/srv/cadence"));
        assert_eq!(dir, PathBuf::from("/srv/cadence/workflows"));
    }

    #[test]
    fn resolve_workflow_dir_uses_explicit_path() {
        let config = EngineConfig {
            workflow_dir: "/opt/flows".to_string(),
            ..EngineConfig::default()
        };
        let dir = resolve_workflow_dir(&config, Path::new("/srv/cadence"));
        assert_eq!(dir, PathBuf::from("/opt/flows"));
    }
}
