//! Data-access contract
//!
//! [`StoreTx`] is the set of primitives available inside one unit of work.
//! Every primitive is scoped by workspace; none of them enforce business
//! rules beyond the storage constraints:
//!
//! - one config per (workspace, project)
//! - blueprint, value and binding ids unique per workspace
//! - at most one open value row per (workspace, project, key)
//! - one binding per (workspace, project, environment name)
//!
//! A violated constraint surfaces as [`StoreError::Conflict`].
//!
//! [`ConfigStore::in_transaction`] runs a closure against a [`StoreTx`] and
//! commits its writes together, or discards all of them if the closure
//! returns an error.

use crate::error::{StoreError, StoreResult};
use agentcfg_model::{
    AgentConfig, Blueprint, BlueprintId, BlueprintType, ConfigId, ConfigValue, EnvBinding,
    EnvironmentBinding, ProjectId,
};
use chrono::{DateTime, Utc};

/// Unit-of-work mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Reads only; any mutation fails with [`StoreError::ReadOnly`]
    Read,
    /// Reads and writes committed atomically
    Write,
}

/// Storage primitives available inside a unit of work
pub trait StoreTx {
    // ------------------------------------------------------------------
    // Configs
    // ------------------------------------------------------------------

    /// Config owned by `project_id`, if created
    fn get_config_by_project(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
    ) -> StoreResult<Option<AgentConfig>>;

    /// Config with identifier `id`, whichever project owns it
    fn get_config_by_id(&self, workspace_id: &str, id: ConfigId) -> StoreResult<Option<AgentConfig>>;

    /// Insert a new config
    fn insert_config(&mut self, workspace_id: &str, config: &AgentConfig) -> StoreResult<()>;

    // ------------------------------------------------------------------
    // Blueprints
    // ------------------------------------------------------------------

    /// Insert a blueprint record; attached `values` and `envs` are ignored
    fn insert_blueprint(
        &mut self,
        workspace_id: &str,
        config_id: ConfigId,
        blueprint: &Blueprint,
    ) -> StoreResult<()>;

    /// Blueprint of any type and project
    fn get_blueprint_by_id(
        &self,
        workspace_id: &str,
        id: BlueprintId,
    ) -> StoreResult<Option<Blueprint>>;

    /// Blueprint matching id, project and type
    fn get_blueprint_by_id_and_type(
        &self,
        workspace_id: &str,
        id: BlueprintId,
        project_id: ProjectId,
        blueprint_type: BlueprintType,
    ) -> StoreResult<Option<Blueprint>>;

    /// Highest-id blueprint of the given type
    fn get_latest_blueprint(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_type: BlueprintType,
    ) -> StoreResult<Option<Blueprint>>;

    /// Type of each id in `ids` that exists in the project; unknown ids are omitted
    fn get_blueprint_kinds(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        ids: &[BlueprintId],
    ) -> StoreResult<Vec<(BlueprintId, BlueprintType)>>;

    /// `BLUEPRINT` records newest first, with sorted env names attached
    fn get_blueprint_history(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        limit: u32,
        offset: u64,
    ) -> StoreResult<Vec<Blueprint>>;

    /// Number of `BLUEPRINT` records in the project
    fn count_blueprints(&self, workspace_id: &str, project_id: ProjectId) -> StoreResult<u64>;

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Set `valid_to` on every open row of the project whose key is in `keys`
    ///
    /// Returns the number of rows closed.
    fn close_values_for_keys(
        &mut self,
        workspace_id: &str,
        project_id: ProjectId,
        valid_to: BlueprintId,
        keys: &[String],
    ) -> StoreResult<usize>;

    /// Insert value rows as given
    fn batch_insert_values(
        &mut self,
        workspace_id: &str,
        config_id: ConfigId,
        values: &[ConfigValue],
    ) -> StoreResult<()>;

    /// Rows effective as of `blueprint_id`
    fn get_effective_values(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<ConfigValue>>;

    /// Rows introduced by `blueprint_id`
    fn get_delta_values(
        &self,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<ConfigValue>>;

    /// Every value row of the project, open or closed
    fn list_value_rows(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
    ) -> StoreResult<Vec<ConfigValue>>;

    // ------------------------------------------------------------------
    // Environments
    // ------------------------------------------------------------------

    /// Blueprint an environment is pinned to
    fn get_blueprint_id_by_env(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        env_name: &str,
    ) -> StoreResult<Option<BlueprintId>>;

    /// Sorted names of environments pinned to `blueprint_id`
    fn get_envs_by_blueprint(
        &self,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<String>>;

    /// Existing bindings among `env_names`
    fn get_envs_by_names(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        env_names: &[String],
    ) -> StoreResult<Vec<EnvironmentBinding>>;

    /// Insert new bindings
    fn batch_insert_envs(
        &mut self,
        workspace_id: &str,
        envs: &[EnvironmentBinding],
    ) -> StoreResult<()>;

    /// Re-point existing bindings by name, stamping editor and time
    ///
    /// Returns the number of bindings updated.
    fn batch_update_envs(
        &mut self,
        workspace_id: &str,
        project_id: ProjectId,
        updated_by: &str,
        updated_at: DateTime<Utc>,
        envs: &[EnvBinding],
    ) -> StoreResult<usize>;
}

/// Unit-of-work runner
pub trait ConfigStore: Send + Sync {
    /// Run `f` inside one transaction
    ///
    /// In [`TxMode::Write`] the writes made by `f` become visible only if it
    /// returns `Ok`.
    ///
    /// # Errors
    /// Returns the closure's error, or a [`StoreError`] from opening or
    /// committing the transaction
    fn in_transaction<T, E, F>(&self, mode: TxMode, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>;
}

impl<S: ConfigStore> ConfigStore for std::sync::Arc<S> {
    fn in_transaction<T, E, F>(&self, mode: TxMode, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).in_transaction(mode, f)
    }
}
