//! Point-in-time resolution
//!
//! A row is effective as of blueprint `B` iff
//! `valid_from <= B && (valid_to is unset || valid_to > B)`. Resolution never
//! deduplicates: a key appearing twice means the interval invariant was
//! broken, and is reported as such.

use crate::error::{BlueprintError, NotFoundError};
use crate::versioning::require_config;
use agentcfg_model::{
    Blueprint, BlueprintId, BlueprintPage, BlueprintType, ConfigValue, PageRequest, ProjectId,
};
use agentcfg_store::StoreTx;
use std::collections::HashSet;

/// Reconstructs effective value sets, deltas and history
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    /// Create resolver
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Effective values as of `blueprint_id`, or of the latest `BLUEPRINT`
    ///
    /// The returned blueprint carries its values and the names of the
    /// environments pinned to it.
    ///
    /// # Errors
    /// Returns `NotFound` if the project has no config, has no blueprint, or
    /// `blueprint_id` is not a `BLUEPRINT` of the project
    pub fn resolve_effective(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_id: Option<BlueprintId>,
    ) -> Result<Blueprint, BlueprintError> {
        require_config(tx, workspace_id, project_id)?;

        let blueprint = match blueprint_id {
            Some(id) => tx
                .get_blueprint_by_id_and_type(workspace_id, id, project_id, BlueprintType::Blueprint)?
                .ok_or(NotFoundError::Blueprint(id))?,
            None => tx
                .get_latest_blueprint(workspace_id, project_id, BlueprintType::Blueprint)?
                .ok_or(NotFoundError::LatestBlueprint(project_id))?,
        };

        let values = tx.get_effective_values(workspace_id, project_id, blueprint.id)?;
        ensure_unique_keys(blueprint.id, &values)?;
        let envs = tx.get_envs_by_blueprint(workspace_id, blueprint.id)?;

        tracing::debug!(
            "Resolved {} effective values at blueprint '{}'",
            values.len(),
            blueprint.id
        );
        Ok(blueprint.with_values(values).with_envs(envs))
    }

    /// Effective values of the blueprint an environment is pinned to
    ///
    /// # Errors
    /// Returns `NotFound` if the project has no config, the environment is
    /// unknown, or it is pinned to a mask
    pub fn resolve_by_environment(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        project_id: ProjectId,
        env_name: &str,
    ) -> Result<Blueprint, BlueprintError> {
        require_config(tx, workspace_id, project_id)?;

        let blueprint_id = tx
            .get_blueprint_id_by_env(workspace_id, project_id, env_name)?
            .ok_or_else(|| NotFoundError::Environment {
                env_name: env_name.to_string(),
            })?;

        if let Some(pinned) = tx.get_blueprint_by_id(workspace_id, blueprint_id)? {
            if pinned.is_mask() {
                return Err(NotFoundError::PinnedToMask {
                    env_name: env_name.to_string(),
                    mask_id: blueprint_id,
                }
                .into());
            }
        }

        self.resolve_effective(tx, workspace_id, project_id, Some(blueprint_id))
    }

    /// Rows introduced by `blueprint_id`; works for masks too
    ///
    /// # Errors
    /// Returns `NotFound` if the blueprint does not exist
    pub fn resolve_delta(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> Result<Blueprint, BlueprintError> {
        let blueprint = tx
            .get_blueprint_by_id(workspace_id, blueprint_id)?
            .ok_or(NotFoundError::Blueprint(blueprint_id))?;
        let values = tx.get_delta_values(workspace_id, blueprint_id)?;
        Ok(blueprint.with_values(values))
    }

    /// `BLUEPRINT` history, newest first
    ///
    /// # Errors
    /// Returns `NotFound` if the project has no config
    pub fn history(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        project_id: ProjectId,
        page: PageRequest,
    ) -> Result<BlueprintPage, BlueprintError> {
        require_config(tx, workspace_id, project_id)?;

        let content =
            tx.get_blueprint_history(workspace_id, project_id, page.size(), page.offset())?;
        let total = tx.count_blueprints(workspace_id, project_id)?;

        Ok(BlueprintPage {
            page: page.page(),
            size: page.size(),
            total,
            content,
        })
    }
}

fn ensure_unique_keys(blueprint_id: BlueprintId, values: &[ConfigValue]) -> Result<(), BlueprintError> {
    let mut seen = HashSet::with_capacity(values.len());
    for value in values {
        if !seen.insert(value.key.as_str()) {
            tracing::error!(
                "Key '{}' resolved twice at blueprint '{}'",
                value.key,
                blueprint_id
            );
            return Err(BlueprintError::invariant(format!(
                "key '{}' has overlapping intervals at blueprint '{blueprint_id}'",
                value.key
            )));
        }
    }
    Ok(())
}
