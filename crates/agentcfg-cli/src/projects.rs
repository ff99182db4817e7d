//! Project directory kept in the configuration database
//!
//! Projects live in an `agent_projects` table beside the store's own tables.
//! Name uniqueness per workspace is a table constraint, so concurrent
//! `agentcfg` processes creating the same project agree on one ID.

use agentcfg_core::{ProjectDirectory, ProjectError};
use agentcfg_model::{Project, ProjectId, RequestIdentity};
use agentcfg_store::SqliteStoreConfig;
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

const PROJECTS_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS agent_projects (
    workspace_id TEXT NOT NULL,
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (workspace_id, id),
    UNIQUE (workspace_id, name)
);
";

/// SQLite-backed project directory
#[derive(Debug, Clone)]
pub(crate) struct SqliteProjectDirectory {
    config: SqliteStoreConfig,
}

impl SqliteProjectDirectory {
    pub(crate) fn new(config: SqliteStoreConfig) -> Self {
        Self { config }
    }

    /// Run `f` on a fresh connection off the async runtime
    async fn with_connection<T, F>(&self, f: F) -> Result<T, ProjectError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let connection = Connection::open(&config.path)?;
            connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
            connection.execute_batch(PROJECTS_SCHEMA)?;
            f(&connection)
        })
        .await
        .map_err(|e| ProjectError::Unavailable(e.to_string()))?
        .map_err(|e| ProjectError::Unavailable(format!("{}: {e}", self.config.path.display())))
    }
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let id: String = row.get(0)?;
    let id = id.parse::<ProjectId>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Project {
        id,
        name: row.get(1)?,
    })
}

#[async_trait::async_trait]
impl ProjectDirectory for SqliteProjectDirectory {
    async fn get(&self, project_id: ProjectId, workspace_id: &str) -> Result<Project, ProjectError> {
        let workspace_id = workspace_id.to_string();
        self.with_connection(move |connection| {
            connection
                .query_row(
                    "SELECT id, name FROM agent_projects WHERE workspace_id = ?1 AND id = ?2",
                    params![workspace_id, project_id.to_string()],
                    project_from_row,
                )
                .optional()
        })
        .await?
        .ok_or(ProjectError::NotFound(project_id))
    }

    async fn get_or_create(
        &self,
        project_name: &str,
        identity: &RequestIdentity,
    ) -> Result<Project, ProjectError> {
        let workspace_id = identity.workspace_id.clone();
        let name = project_name.to_string();
        let candidate = ProjectId::new();

        let (project, created) = self
            .with_connection(move |connection| {
                let inserted = connection.execute(
                    "INSERT INTO agent_projects (workspace_id, id, name) VALUES (?1, ?2, ?3) \
                     ON CONFLICT (workspace_id, name) DO NOTHING",
                    params![workspace_id, candidate.to_string(), name],
                )?;
                let project = connection.query_row(
                    "SELECT id, name FROM agent_projects WHERE workspace_id = ?1 AND name = ?2",
                    params![workspace_id, name],
                    project_from_row,
                )?;
                Ok((project, inserted == 1))
            })
            .await?;

        if created {
            tracing::info!(
                "Created project '{}' ({}) in workspace '{}'",
                project.name,
                project.id,
                identity.workspace_id
            );
        }
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn directory(dir: &tempfile::TempDir) -> SqliteProjectDirectory {
        SqliteProjectDirectory::new(SqliteStoreConfig::new(dir.path().join("configs.db")))
    }

    #[tokio::test]
    async fn projects_persist_per_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let alice = RequestIdentity::new("ws-a", "alice");
        let bob = RequestIdentity::new("ws-b", "bob");

        let created = directory(&dir).get_or_create("bot", &alice).await.unwrap();

        let reopened = directory(&dir);
        assert_eq!(reopened.get_or_create("bot", &alice).await.unwrap(), created);
        assert_eq!(reopened.get(created.id, "ws-a").await.unwrap(), created);

        let other = reopened.get_or_create("bot", &bob).await.unwrap();
        assert_ne!(other.id, created.id);
        assert_eq!(
            reopened.get(created.id, "ws-b").await.unwrap_err(),
            ProjectError::NotFound(created.id)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creators_agree_on_one_project() {
        let dir = tempfile::tempdir().unwrap();
        let identity = RequestIdentity::new("ws-a", "alice");

        let creators: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory(&dir);
                let identity = identity.clone();
                tokio::spawn(async move { directory.get_or_create("bot", &identity).await })
            })
            .collect();

        let mut ids = Vec::new();
        for creator in creators {
            ids.push(creator.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn shares_the_store_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteStoreConfig::new(dir.path().join("configs.db"));
        agentcfg_store::SqliteStore::open(&config).unwrap();

        let project = SqliteProjectDirectory::new(config.clone())
            .get_or_create("bot", &RequestIdentity::new("ws-a", "alice"))
            .await
            .unwrap();
        assert_eq!(project.name, "bot");

        agentcfg_store::SqliteStore::open(&config).unwrap();
        assert!(!dir.path().join("configs.projects.json").exists());
    }
}
