//! YAML workflow store.
//!
//! Implements the `WorkflowRepository` trait from `cadence-core` with one
//! human-diffable `<uuid>.yaml` file per workflow:
//!
//! ```text
//! {workflow_dir}/
//!   0192a0c4-....yaml
//!   0192a0c5-....yaml
//! ```
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! crash mid-save never leaves a truncated record behind.

use std::path::{Path, PathBuf};

use cadence_core::repository::workflow::WorkflowRepository;
use cadence_types::error::RepositoryError;
use cadence_types::workflow::Workflow;
use uuid::Uuid;

const RECORD_EXTENSION: &str = "yaml";

pub struct YamlWorkflowRepository {
    dir: PathBuf,
}

impl YamlWorkflowRepository {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }
}

impl WorkflowRepository for YamlWorkflowRepository {
    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let yaml = serde_yaml_ng::to_string(workflow)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let path = self.record_path(&workflow.metadata.id);
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            workflow_id = %workflow.metadata.id,
            path = %path.display(),
            "workflow saved"
        );
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("workflow directory {} does not exist yet", self.dir.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut workflows = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!("Failed to read {}: {err}, skipping", path.display());
                    continue;
                }
            };
            match serde_yaml_ng::from_str::<Workflow>(&content) {
                Ok(workflow) => workflows.push(workflow),
                Err(err) => {
                    tracing::warn!("Failed to parse {}: {err}, skipping", path.display());
                }
            }
        }

        workflows.sort_by_key(|w| w.metadata.created_at);
        Ok(workflows)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::workflow::{StepConfig, WorkflowMetadata, WorkflowSettings, WorkflowStep};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;

    fn workflow(name: &str) -> Workflow {
        let now = Utc::now();
        Workflow {
            metadata: WorkflowMetadata {
                id: Uuid::now_v7(),
                name: name.to_string(),
                description: None,
                version: "1.0.0".to_string(),
                tags: Vec::new(),
                author: None,
                created_at: now,
                updated_at: now,
                enabled: true,
                is_system: false,
                is_template: false,
            },
            triggers: Vec::new(),
            steps: vec![WorkflowStep::new(
                "greet",
                "Greet",
                StepConfig::Action {
                    action_type: "echo".to_string(),
                    params: json!({"msg": "hi"}),
                    result_variable: None,
                },
            )],
            input_variables: Vec::new(),
            output_variables: Vec::new(),
            settings: WorkflowSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_all() {
        let dir = tempdir().unwrap();
        let repo = YamlWorkflowRepository::new(dir.path().join("workflows"));

        let wf = workflow("nightly");
        repo.save(&wf).await.unwrap();

        let path = dir.path().join("workflows").join(format!("{}.yaml", wf.metadata.id));
        assert!(path.exists());

        let loaded = repo.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].metadata.id, wf.metadata.id);
        assert_eq!(loaded[0].metadata.name, "nightly");
        assert_eq!(loaded[0].steps[0].id, "greet");
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_record() {
        let dir = tempdir().unwrap();
        let repo = YamlWorkflowRepository::new(dir.path());

        let mut wf = workflow("first");
        repo.save(&wf).await.unwrap();
        wf.metadata.name = "renamed".to_string();
        repo.save(&wf).await.unwrap();

        let loaded = repo.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].metadata.name, "renamed");
    }

    #[tokio::test]
    async fn test_load_all_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let repo = YamlWorkflowRepository::new(dir.path().join("nope"));
        assert!(repo.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_all_skips_garbage_and_foreign_files() {
        let dir = tempdir().unwrap();
        let repo = YamlWorkflowRepository::new(dir.path());
        repo.save(&workflow("good")).await.unwrap();

        tokio::fs::write(dir.path().join("broken.yaml"), "steps: [unclosed")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("README.md"), "# notes").await.unwrap();

        let loaded = repo.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].metadata.name, "good");
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let repo = YamlWorkflowRepository::new(dir.path());
        let wf = workflow("doomed");
        repo.save(&wf).await.unwrap();

        assert!(repo.delete(&wf.metadata.id).await.unwrap());
        assert!(!repo.delete(&wf.metadata.id).await.unwrap());
        assert!(repo.load_all().await.unwrap().is_empty());
    }
}
