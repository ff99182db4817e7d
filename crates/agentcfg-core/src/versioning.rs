//! Blueprint versioning
//!
//! Appending a `BLUEPRINT` closes every open row whose key is being
//! rewritten and opens one row per submitted value:
//!
//! ```text
//! key     B1        B2        B3
//! x       [1 ------)[3 ----------
//! y       [2 --------------------
//! z                           [7 ---
//! ```
//!
//! A `MASK` never touches the timeline. Its rows are stored as zero-width
//! intervals `[M, M)` that are only reachable through the mask's delta.

use crate::directory::ProjectDirectory;
use crate::error::{BlueprintError, NotFoundError};
use crate::ids::IdGenerator;
use agentcfg_model::{
    AgentConfig, Blueprint, BlueprintDraft, BlueprintId, BlueprintType, ConfigId, ConfigValue,
    Project, ProjectRef, RequestIdentity, ValidationError, ValueId,
};
use agentcfg_store::StoreTx;
use chrono::Utc;
use std::sync::Arc;

/// How far ahead of the local clock a caller-supplied blueprint ID may be stamped
pub const MAX_ID_CLOCK_SKEW_MS: u64 = 60_000;

/// Creates blueprint versions
#[derive(Clone)]
pub struct VersioningEngine {
    directory: Arc<dyn ProjectDirectory>,
    ids: Arc<dyn IdGenerator>,
}

impl VersioningEngine {
    /// Create engine
    #[must_use]
    pub fn new(directory: Arc<dyn ProjectDirectory>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { directory, ids }
    }

    pub(crate) fn ids(&self) -> Arc<dyn IdGenerator> {
        Arc::clone(&self.ids)
    }

    /// Resolve the target project through the directory
    ///
    /// Runs before the write unit of work opens.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown project ID, or a directory failure
    pub async fn resolve_project(
        &self,
        identity: &RequestIdentity,
        project: &ProjectRef,
    ) -> Result<Project, BlueprintError> {
        let project = match project {
            ProjectRef::Id(id) => self.directory.get(*id, &identity.workspace_id).await?,
            ProjectRef::Name(name) => self.directory.get_or_create(name, identity).await?,
        };
        tracing::debug!("Resolved project '{}' ({})", project.name, project.id);
        Ok(project)
    }

    /// Append `draft` to the project's config inside a write unit of work
    ///
    /// Creates the config on first use, with `config_id` if supplied.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a taken config ID or a taken, stale or
    /// future-stamped blueprint ID, and an invariant violation if a storage
    /// constraint fails
    pub fn append(
        &self,
        tx: &mut dyn StoreTx,
        identity: &RequestIdentity,
        project: &Project,
        config_id: Option<ConfigId>,
        draft: &BlueprintDraft,
    ) -> Result<Blueprint, BlueprintError> {
        let workspace_id = identity.workspace_id.as_str();
        let config = self.ensure_config(tx, identity, project, config_id)?;
        let blueprint_id = self.assign_id(tx, workspace_id, project, draft)?;

        let now = Utc::now();
        let blueprint = Blueprint {
            id: blueprint_id,
            project_id: project.id,
            blueprint_type: draft.blueprint_type,
            description: draft.description.clone(),
            envs: Vec::new(),
            created_by: identity.user_name.clone(),
            created_at: now,
            last_updated_by: identity.user_name.clone(),
            last_updated_at: now,
            values: Vec::new(),
        };

        let valid_to = match draft.blueprint_type {
            BlueprintType::Blueprint => {
                let closed = tx.close_values_for_keys(
                    workspace_id,
                    project.id,
                    blueprint_id,
                    &draft.keys(),
                )?;
                tracing::debug!("Closed {} value rows at blueprint '{}'", closed, blueprint_id);
                None
            }
            BlueprintType::Mask => Some(blueprint_id),
        };

        tx.insert_blueprint(workspace_id, config.id, &blueprint)?;

        let values: Vec<ConfigValue> = draft
            .values
            .iter()
            .map(|v| ConfigValue {
                id: ValueId::from_ulid(self.ids.generate()),
                project_id: project.id,
                key: v.key.clone(),
                value: v.value.clone(),
                value_type: v.value_type,
                description: v.description.clone(),
                valid_from: blueprint_id,
                valid_to,
            })
            .collect();
        tx.batch_insert_values(workspace_id, config.id, &values)?;

        tracing::info!(
            "Created {} '{}' with {} values for project '{}' in workspace '{}'",
            blueprint.blueprint_type,
            blueprint_id,
            values.len(),
            project.id,
            workspace_id
        );
        Ok(blueprint.with_values(values))
    }

    fn ensure_config(
        &self,
        tx: &mut dyn StoreTx,
        identity: &RequestIdentity,
        project: &Project,
        config_id: Option<ConfigId>,
    ) -> Result<AgentConfig, BlueprintError> {
        if let Some(config) = tx.get_config_by_project(&identity.workspace_id, project.id)? {
            return Ok(config);
        }
        if let Some(id) = config_id {
            if tx.get_config_by_id(&identity.workspace_id, id)?.is_some() {
                return Err(ValidationError::ConfigIdTaken(id).into());
            }
        }

        let now = Utc::now();
        let config = AgentConfig {
            id: config_id.unwrap_or_else(|| ConfigId::from_ulid(self.ids.generate())),
            project_id: project.id,
            created_by: identity.user_name.clone(),
            created_at: now,
            last_updated_by: identity.user_name.clone(),
            last_updated_at: now,
        };
        tx.insert_config(&identity.workspace_id, &config)?;
        tracing::info!(
            "Created config '{}' for project '{}' in workspace '{}'",
            config.id,
            project.id,
            identity.workspace_id
        );
        Ok(config)
    }

    fn assign_id(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        project: &Project,
        draft: &BlueprintDraft,
    ) -> Result<BlueprintId, BlueprintError> {
        let (id, supplied) = match draft.id {
            Some(id) => {
                ensure_not_ahead(id)?;
                if tx.get_blueprint_by_id(workspace_id, id)?.is_some() {
                    return Err(ValidationError::BlueprintIdTaken(id).into());
                }
                (id, true)
            }
            None => (BlueprintId::from_ulid(self.ids.generate()), false),
        };

        if draft.blueprint_type != BlueprintType::Blueprint {
            return Ok(id);
        }
        let Some(latest) =
            tx.get_latest_blueprint(workspace_id, project.id, BlueprintType::Blueprint)?
        else {
            return Ok(id);
        };
        if latest.id < id {
            return Ok(id);
        }
        if supplied {
            return Err(ValidationError::BlueprintIdNotNewer {
                requested: id,
                latest: latest.id,
            }
            .into());
        }

        // An earlier caller-supplied ID can sit ahead of the generator
        let next = latest.id.as_ulid().increment().ok_or_else(|| {
            BlueprintError::invariant(format!("no blueprint id after '{}'", latest.id))
        })?;
        tracing::debug!(
            "Generated blueprint id '{}' trails latest '{}', using '{}'",
            id,
            latest.id,
            next
        );
        Ok(BlueprintId::from_ulid(next))
    }
}

fn ensure_not_ahead(id: BlueprintId) -> Result<(), ValidationError> {
    let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    if id.as_ulid().timestamp_ms() > now_ms.saturating_add(MAX_ID_CLOCK_SKEW_MS) {
        return Err(ValidationError::BlueprintIdInFuture {
            requested: id,
            max_skew_ms: MAX_ID_CLOCK_SKEW_MS,
        });
    }
    Ok(())
}

impl std::fmt::Debug for VersioningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersioningEngine").finish_non_exhaustive()
    }
}

/// Config lookup shared by every operation that requires an existing config
///
/// # Errors
/// Returns `NotFound` if the project has no config
pub(crate) fn require_config(
    tx: &dyn StoreTx,
    workspace_id: &str,
    project_id: agentcfg_model::ProjectId,
) -> Result<AgentConfig, BlueprintError> {
    tx.get_config_by_project(workspace_id, project_id)?
        .ok_or_else(|| NotFoundError::Config(project_id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryProjectDirectory;
    use crate::ids::MonotonicUlidGenerator;
    use agentcfg_model::{NewValue, ProjectId, ValueType};
    use agentcfg_store::{ConfigStore, MemoryStore, TxMode};

    fn engine() -> VersioningEngine {
        VersioningEngine::new(
            Arc::new(InMemoryProjectDirectory::new()),
            Arc::new(MonotonicUlidGenerator::new()),
        )
    }

    fn project() -> Project {
        Project {
            id: ProjectId::new(),
            name: "bot".into(),
        }
    }

    fn draft(pairs: &[(&str, &str)]) -> BlueprintDraft {
        BlueprintDraft::blueprint(
            pairs
                .iter()
                .map(|(k, v)| NewValue::new(*k, *v, ValueType::String))
                .collect(),
        )
    }

    fn append(
        store: &MemoryStore,
        engine: &VersioningEngine,
        project: &Project,
        draft: &BlueprintDraft,
    ) -> Result<Blueprint, BlueprintError> {
        let identity = RequestIdentity::new("ws", "alice");
        store.in_transaction(TxMode::Write, |tx| {
            engine.append(tx, &identity, project, None, draft)
        })
    }

    #[test]
    fn second_blueprint_closes_rewritten_keys_only() {
        let store = MemoryStore::new();
        let engine = engine();
        let project = project();

        let b1 = append(&store, &engine, &project, &draft(&[("x", "1"), ("y", "2")])).unwrap();
        let b2 = append(&store, &engine, &project, &draft(&[("x", "3")])).unwrap();
        assert!(b2.id > b1.id);

        let rows = store
            .in_transaction(TxMode::Read, |tx| tx.list_value_rows("ws", project.id))
            .unwrap();
        let x1 = rows.iter().find(|r| r.key == "x" && r.value == "1").unwrap();
        let y2 = rows.iter().find(|r| r.key == "y").unwrap();
        assert_eq!(x1.valid_to, Some(b2.id));
        assert!(y2.is_open());
    }

    #[test]
    fn mask_rows_are_zero_width() {
        let store = MemoryStore::new();
        let engine = engine();
        let project = project();

        let b1 = append(&store, &engine, &project, &draft(&[("x", "1")])).unwrap();
        let mut mask_draft = draft(&[("x", "99")]);
        mask_draft.blueprint_type = BlueprintType::Mask;
        let mask = append(&store, &engine, &project, &mask_draft).unwrap();

        assert_eq!(mask.values[0].valid_to, Some(mask.id));

        let rows = store
            .in_transaction(TxMode::Read, |tx| tx.list_value_rows("ws", project.id))
            .unwrap();
        let base = rows.iter().find(|r| r.valid_from == b1.id).unwrap();
        assert!(base.is_open());
    }

    #[test]
    fn supplied_id_must_be_new_and_newer() {
        let store = MemoryStore::new();
        let engine = engine();
        let project = project();

        let early = BlueprintId::from_ulid(ulid::Ulid::from_parts(1, 0));
        let b1 = append(&store, &engine, &project, &draft(&[("x", "1")])).unwrap();

        let taken = append(&store, &engine, &project, &draft(&[("x", "2")]).with_id(b1.id))
            .unwrap_err();
        assert!(matches!(
            taken,
            BlueprintError::InvalidArgument(ValidationError::BlueprintIdTaken(_))
        ));

        let stale = append(&store, &engine, &project, &draft(&[("x", "2")]).with_id(early))
            .unwrap_err();
        assert!(matches!(
            stale,
            BlueprintError::InvalidArgument(ValidationError::BlueprintIdNotNewer { .. })
        ));
    }

    #[test]
    fn generated_id_follows_a_future_supplied_id() {
        let store = MemoryStore::new();
        let engine = engine();
        let project = project();

        let ahead_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap() + 30_000;
        let ahead = BlueprintId::from_ulid(ulid::Ulid::from_parts(ahead_ms, 0));
        let pinned = append(&store, &engine, &project, &draft(&[("x", "1")]).with_id(ahead))
            .unwrap();
        assert_eq!(pinned.id, ahead);

        let next = append(&store, &engine, &project, &draft(&[("x", "2")])).unwrap();
        assert!(next.id > ahead);

        let after = append(&store, &engine, &project, &draft(&[("x", "3")])).unwrap();
        assert!(after.id > next.id);
    }

    #[test]
    fn supplied_id_far_in_future_is_rejected() {
        let store = MemoryStore::new();
        let engine = engine();
        let project = project();

        let far = BlueprintId::from_ulid(ulid::Ulid::from_parts(u64::from(u32::MAX) * 1000, 0));
        let err = append(&store, &engine, &project, &draft(&[("x", "1")]).with_id(far))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(matches!(
            err,
            BlueprintError::InvalidArgument(ValidationError::BlueprintIdInFuture { .. })
        ));

        let rows = store
            .in_transaction(TxMode::Read, |tx| tx.list_value_rows("ws", project.id))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn supplied_config_id_of_another_project_is_rejected() {
        let store = MemoryStore::new();
        let engine = engine();
        let identity = RequestIdentity::new("ws", "alice");
        let config_id = ConfigId::from_ulid(ulid::Ulid::new());
        let (first, second) = (project(), project());

        store
            .in_transaction(TxMode::Write, |tx| {
                engine.append(tx, &identity, &first, Some(config_id), &draft(&[("x", "1")]))
            })
            .unwrap();

        let err = store
            .in_transaction(TxMode::Write, |tx| {
                engine.append(tx, &identity, &second, Some(config_id), &draft(&[("x", "1")]))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            BlueprintError::InvalidArgument(ValidationError::ConfigIdTaken(id)) if id == config_id
        ));
    }

    #[test]
    fn supplied_config_id_is_used_on_first_write() {
        let store = MemoryStore::new();
        let engine = engine();
        let project = project();
        let identity = RequestIdentity::new("ws", "alice");
        let config_id = ConfigId::from_ulid(ulid::Ulid::new());

        store
            .in_transaction(TxMode::Write, |tx| {
                engine.append(tx, &identity, &project, Some(config_id), &draft(&[("x", "1")]))
            })
            .unwrap();

        let config = store
            .in_transaction(TxMode::Read, |tx| require_config(tx, "ws", project.id))
            .unwrap();
        assert_eq!(config.id, config_id);
    }
}
