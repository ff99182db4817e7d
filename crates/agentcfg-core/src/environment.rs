//! Environment pinning

use crate::error::{BlueprintError, NotFoundError};
use crate::ids::IdGenerator;
use crate::versioning::require_config;
use agentcfg_model::{
    BlueprintId, BlueprintType, EnvBinding, EnvId, EnvUpdateRequest, EnvironmentBinding,
    RequestIdentity,
};
use agentcfg_store::StoreTx;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What to do when a binding targets a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskBindingPolicy {
    /// Fail the whole request
    #[default]
    Reject,
    /// Store the pin; resolving the environment fails later
    Defer,
}

/// Validates and persists environment pins
#[derive(Clone)]
pub struct EnvironmentBinder {
    ids: Arc<dyn IdGenerator>,
    policy: MaskBindingPolicy,
}

impl EnvironmentBinder {
    /// Create binder
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>, policy: MaskBindingPolicy) -> Self {
        Self { ids, policy }
    }

    /// Create or re-point every binding in `request` inside a write unit of work
    ///
    /// Returns the stored bindings, sorted by environment name.
    ///
    /// # Errors
    /// Returns `NotFound` if the project has no config, a referenced
    /// blueprint is not in the project, or (under [`MaskBindingPolicy::Reject`])
    /// a referenced blueprint is a mask
    pub fn bind(
        &self,
        tx: &mut dyn StoreTx,
        identity: &RequestIdentity,
        request: &EnvUpdateRequest,
    ) -> Result<Vec<EnvironmentBinding>, BlueprintError> {
        let workspace_id = identity.workspace_id.as_str();
        let project_id = request.project_id;
        let config = require_config(tx, workspace_id, project_id)?;

        self.check_targets(tx, workspace_id, request)?;

        let names: Vec<String> = request.envs.iter().map(|e| e.env_name.clone()).collect();
        let existing: HashSet<String> = tx
            .get_envs_by_names(workspace_id, project_id, &names)?
            .into_iter()
            .map(|e| e.env_name)
            .collect();

        let (updates, inserts): (Vec<&EnvBinding>, Vec<&EnvBinding>) = request
            .envs
            .iter()
            .partition(|e| existing.contains(&e.env_name));

        let now = Utc::now();
        if !inserts.is_empty() {
            let fresh: Vec<EnvironmentBinding> = inserts
                .iter()
                .map(|e| EnvironmentBinding {
                    id: EnvId::from_ulid(self.ids.generate()),
                    project_id,
                    config_id: config.id,
                    env_name: e.env_name.clone(),
                    blueprint_id: e.blueprint_id,
                    created_by: identity.user_name.clone(),
                    created_at: now,
                    last_updated_by: identity.user_name.clone(),
                    last_updated_at: now,
                })
                .collect();
            tracing::info!(
                "Inserting {} new environments for project '{}' in workspace '{}': {:?}",
                fresh.len(),
                project_id,
                workspace_id,
                inserts.iter().map(|e| e.env_name.as_str()).collect::<Vec<_>>()
            );
            tx.batch_insert_envs(workspace_id, &fresh)?;
        }

        if !updates.is_empty() {
            let changes: Vec<EnvBinding> = updates.iter().map(|e| (*e).clone()).collect();
            tracing::info!(
                "Updating {} existing environments for project '{}' in workspace '{}': {:?}",
                changes.len(),
                project_id,
                workspace_id,
                updates.iter().map(|e| e.env_name.as_str()).collect::<Vec<_>>()
            );
            let updated = tx.batch_update_envs(
                workspace_id,
                project_id,
                &identity.user_name,
                now,
                &changes,
            )?;
            if updated != changes.len() {
                return Err(BlueprintError::invariant(format!(
                    "expected to update {} environments, updated {updated}",
                    changes.len()
                )));
            }
        }

        let mut stored = tx.get_envs_by_names(workspace_id, project_id, &names)?;
        stored.sort_by(|a, b| a.env_name.cmp(&b.env_name));
        Ok(stored)
    }

    fn check_targets(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        request: &EnvUpdateRequest,
    ) -> Result<(), BlueprintError> {
        let wanted = request.blueprint_ids();
        let kinds: HashMap<BlueprintId, BlueprintType> = tx
            .get_blueprint_kinds(workspace_id, request.project_id, &wanted)?
            .into_iter()
            .collect();

        let missing: Vec<BlueprintId> = wanted
            .iter()
            .copied()
            .filter(|id| !kinds.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(NotFoundError::Blueprints(missing).into());
        }

        let masks: Vec<BlueprintId> = wanted
            .iter()
            .copied()
            .filter(|id| kinds.get(id) == Some(&BlueprintType::Mask))
            .collect();
        if !masks.is_empty() {
            match self.policy {
                MaskBindingPolicy::Reject => return Err(NotFoundError::MaskBinding(masks).into()),
                MaskBindingPolicy::Defer => {
                    tracing::warn!(
                        "Pinning environments to {} masks in project '{}'",
                        masks.len(),
                        request.project_id
                    );
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for EnvironmentBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentBinder")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_reads_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: MaskBindingPolicy,
        }

        let parsed: Wrapper = toml::from_str("policy = \"defer\"").unwrap();
        assert_eq!(parsed.policy, MaskBindingPolicy::Defer);
        assert!(toml::from_str::<Wrapper>("policy = \"allow\"").is_err());
        assert_eq!(MaskBindingPolicy::default(), MaskBindingPolicy::Reject);
    }
}
