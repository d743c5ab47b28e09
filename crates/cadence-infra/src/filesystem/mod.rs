//! Filesystem adapters for Cadence.
//!
//! Resolves the data directory layout and hosts the YAML-backed
//! [`WorkflowRepository`](cadence_core::repository::workflow::WorkflowRepository)
//! implementation.

pub mod workflow_store;

use std::path::PathBuf;

pub use workflow_store::YamlWorkflowRepository;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CADENCE_DATA_DIR` environment variable
/// 2. `~/.cadence` under the user's home directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CADENCE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".cadence");
    }

    // Last resort: current directory
    PathBuf::from(".cadence")
}

/// Expand a leading `~` to the home directory. Other paths pass through.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var("CADENCE_DATA_DIR", "/tmp/test-cadence");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-cadence"));
        unsafe {
            std::env::remove_var("CADENCE_DATA_DIR");
        }
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/flows"), home.join("flows"));
        assert_eq!(expand_tilde("/abs/flows"), PathBuf::from("/abs/flows"));
        assert_eq!(expand_tilde("rel/~/flows"), PathBuf::from("rel/~/flows"));
    }
}
