//! Project directory collaborator
//!
//! Projects are owned elsewhere; this crate only looks them up, or asks the
//! directory to create one by name.

use agentcfg_model::{Project, ProjectId, RequestIdentity};
use dashmap::DashMap;

/// Project directory failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    /// No project with this ID in the workspace
    #[error("project '{0}' not found")]
    NotFound(ProjectId),

    /// Directory could not be reached or failed internally
    #[error("project directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup and lazy creation of projects
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Fetch an existing project
    async fn get(&self, project_id: ProjectId, workspace_id: &str) -> Result<Project, ProjectError>;

    /// Fetch a project by name, creating it if absent
    async fn get_or_create(
        &self,
        project_name: &str,
        identity: &RequestIdentity,
    ) -> Result<Project, ProjectError>;
}

/// Process-local project directory
#[derive(Debug, Default)]
pub struct InMemoryProjectDirectory {
    by_name: DashMap<(String, String), Project>,
    by_id: DashMap<(String, ProjectId), Project>,
}

impl InMemoryProjectDirectory {
    /// Create empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project under a workspace
    pub fn insert(&self, workspace_id: &str, project: Project) {
        self.by_name.insert(
            (workspace_id.to_string(), project.name.clone()),
            project.clone(),
        );
        self.by_id.insert((workspace_id.to_string(), project.id), project);
    }

    /// Number of projects across all workspaces
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether no project has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait::async_trait]
impl ProjectDirectory for InMemoryProjectDirectory {
    async fn get(&self, project_id: ProjectId, workspace_id: &str) -> Result<Project, ProjectError> {
        self.by_id
            .get(&(workspace_id.to_string(), project_id))
            .map(|entry| entry.value().clone())
            .ok_or(ProjectError::NotFound(project_id))
    }

    async fn get_or_create(
        &self,
        project_name: &str,
        identity: &RequestIdentity,
    ) -> Result<Project, ProjectError> {
        let project = self
            .by_name
            .entry((identity.workspace_id.clone(), project_name.to_string()))
            .or_insert_with(|| {
                tracing::info!(
                    "Creating project '{}' in workspace '{}'",
                    project_name,
                    identity.workspace_id
                );
                Project {
                    id: ProjectId::new(),
                    name: project_name.to_string(),
                }
            })
            .value()
            .clone();
        self.by_id
            .insert((identity.workspace_id.clone(), project.id), project.clone());
        Ok(project)
    }
}
