//! Workflow repository trait definition.
//!
//! Defines the storage interface for workflow definitions. The
//! infrastructure layer (cadence-infra) implements it with one YAML file
//! per workflow. Executions are in-memory only and never pass through here.

use std::collections::HashMap;

use cadence_types::error::RepositoryError;
use cadence_types::workflow::Workflow;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository trait for workflow persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    /// Upsert a workflow (insert or replace by `metadata.id`).
    fn save(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load every stored workflow. Unreadable records are skipped.
    fn load_all(&self) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// Delete a workflow by id. Returns `true` if it existed.
    fn delete(&self, id: &Uuid) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Volatile repository, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryWorkflowRepository {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn contains(&self, id: &Uuid) -> bool {
        self.workflows.read().await.contains_key(id)
    }
}

impl WorkflowRepository for MemoryWorkflowRepository {
    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.workflows
            .write()
            .await
            .insert(workflow.metadata.id, workflow.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self.workflows.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.workflows.write().await.remove(id).is_some())
    }
}
