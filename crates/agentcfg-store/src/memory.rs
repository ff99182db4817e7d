//! In-memory store
//!
//! Writers are serialized by an [`RwLock`]. A write unit of work mutates the
//! live tables in place and records an undo entry per change; if the closure
//! fails (or panics) the entries are replayed in reverse before the lock is
//! released, so a failed write leaves nothing behind.

use crate::contract::{ConfigStore, StoreTx, TxMode};
use crate::error::{StoreError, StoreResult};
use agentcfg_model::{
    AgentConfig, Blueprint, BlueprintId, BlueprintType, ConfigId, ConfigValue, EnvBinding,
    EnvironmentBinding, ProjectId,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Deref;

#[derive(Debug, Clone)]
struct ConfigRow {
    workspace_id: String,
    config: AgentConfig,
}

#[derive(Debug, Clone)]
struct BlueprintRow {
    project_id: ProjectId,
    blueprint: Blueprint,
}

#[derive(Debug, Clone)]
struct ValueRow {
    workspace_id: String,
    value: ConfigValue,
}

#[derive(Debug, Clone)]
struct EnvRow {
    workspace_id: String,
    binding: EnvironmentBinding,
}

#[derive(Debug, Default)]
struct Tables {
    configs: Vec<ConfigRow>,
    blueprints: BTreeMap<(String, BlueprintId), BlueprintRow>,
    values: Vec<ValueRow>,
    envs: Vec<EnvRow>,
}

impl Tables {
    fn blueprints_in<'a>(
        &'a self,
        workspace_id: &'a str,
        project_id: ProjectId,
    ) -> impl DoubleEndedIterator<Item = &'a Blueprint> + 'a {
        self.blueprints
            .iter()
            .filter(move |((ws, _), row)| ws == workspace_id && row.project_id == project_id)
            .map(|(_, row)| &row.blueprint)
    }

    fn values_in<'a>(
        &'a self,
        workspace_id: &'a str,
        project_id: ProjectId,
    ) -> impl Iterator<Item = &'a ConfigValue> + 'a {
        self.values
            .iter()
            .filter(move |row| row.workspace_id == workspace_id && row.value.project_id == project_id)
            .map(|row| &row.value)
    }

    fn env_names_for(&self, workspace_id: &str, blueprint_id: BlueprintId) -> Vec<String> {
        let mut names: Vec<String> = self
            .envs
            .iter()
            .filter(|row| row.workspace_id == workspace_id && row.binding.blueprint_id == blueprint_id)
            .map(|row| row.binding.env_name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Inverse of one mutation made by a write unit of work
#[derive(Debug)]
enum Undo {
    ConfigInserted,
    BlueprintInserted((String, BlueprintId)),
    ValueInserted,
    ValueClosed(usize),
    EnvInserted,
    EnvUpdated(usize, EnvironmentBinding),
}

impl Undo {
    fn revert(self, tables: &mut Tables) {
        match self {
            Self::ConfigInserted => {
                tables.configs.pop();
            }
            Self::BlueprintInserted(key) => {
                tables.blueprints.remove(&key);
            }
            Self::ValueInserted => {
                tables.values.pop();
            }
            Self::ValueClosed(index) => {
                if let Some(row) = tables.values.get_mut(index) {
                    row.value.valid_to = None;
                }
            }
            Self::EnvInserted => {
                tables.envs.pop();
            }
            Self::EnvUpdated(index, previous) => {
                if let Some(row) = tables.envs.get_mut(index) {
                    row.binding = previous;
                }
            }
        }
    }
}

/// Thread-safe in-memory [`ConfigStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn in_transaction<T, E, F>(&self, mode: TxMode, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        match mode {
            TxMode::Read => {
                let guard = self.tables.read();
                let mut tx = MemoryTx::new(TablesRef::Shared(&guard));
                f(&mut tx)
            }
            TxMode::Write => {
                let mut guard = self.tables.write();
                let mut tx = MemoryTx::new(TablesRef::Exclusive(&mut guard));
                let result = f(&mut tx);
                if result.is_ok() {
                    tx.commit();
                }
                result
            }
        }
    }
}

enum TablesRef<'a> {
    Shared(&'a Tables),
    Exclusive(&'a mut Tables),
}

impl Deref for TablesRef<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        match self {
            Self::Shared(tables) => tables,
            Self::Exclusive(tables) => tables,
        }
    }
}

/// Unit of work; rolls back on drop unless committed
struct MemoryTx<'a> {
    tables: TablesRef<'a>,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> MemoryTx<'a> {
    fn new(tables: TablesRef<'a>) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    fn tables_mut(&mut self) -> StoreResult<(&mut Tables, &mut Vec<Undo>)> {
        match &mut self.tables {
            TablesRef::Shared(_) => Err(StoreError::ReadOnly),
            TablesRef::Exclusive(tables) => Ok((&mut **tables, &mut self.undo)),
        }
    }

    fn commit(mut self) {
        self.committed = true;
        self.undo.clear();
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if self.committed || self.undo.is_empty() {
            return;
        }
        if let TablesRef::Exclusive(tables) = &mut self.tables {
            tracing::debug!("Rolling back {} in-memory changes", self.undo.len());
            while let Some(undo) = self.undo.pop() {
                undo.revert(tables);
            }
        }
    }
}

impl StoreTx for MemoryTx<'_> {
    fn get_config_by_project(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
    ) -> StoreResult<Option<AgentConfig>> {
        Ok(self
            .tables
            .configs
            .iter()
            .find(|row| row.workspace_id == workspace_id && row.config.project_id == project_id)
            .map(|row| row.config.clone()))
    }

    fn get_config_by_id(&self, workspace_id: &str, id: ConfigId) -> StoreResult<Option<AgentConfig>> {
        Ok(self
            .tables
            .configs
            .iter()
            .find(|row| row.workspace_id == workspace_id && row.config.id == id)
            .map(|row| row.config.clone()))
    }

    fn insert_config(&mut self, workspace_id: &str, config: &AgentConfig) -> StoreResult<()> {
        let (tables, undo) = self.tables_mut()?;
        if tables.configs.iter().any(|row| {
            row.workspace_id == workspace_id
                && (row.config.id == config.id || row.config.project_id == config.project_id)
        }) {
            return Err(StoreError::Conflict(format!(
                "config '{}' or a config for project '{}' already exists",
                config.id, config.project_id
            )));
        }
        tables.configs.push(ConfigRow {
            workspace_id: workspace_id.to_string(),
            config: config.clone(),
        });
        undo.push(Undo::ConfigInserted);
        Ok(())
    }

    fn insert_blueprint(
        &mut self,
        workspace_id: &str,
        _config_id: ConfigId,
        blueprint: &Blueprint,
    ) -> StoreResult<()> {
        let (tables, undo) = self.tables_mut()?;
        let key = (workspace_id.to_string(), blueprint.id);
        if tables.blueprints.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "blueprint '{}' already exists",
                blueprint.id
            )));
        }
        let stored = blueprint.clone().with_values(Vec::new()).with_envs(Vec::new());
        tables.blueprints.insert(
            key.clone(),
            BlueprintRow {
                project_id: blueprint.project_id,
                blueprint: stored,
            },
        );
        undo.push(Undo::BlueprintInserted(key));
        Ok(())
    }

    fn get_blueprint_by_id(
        &self,
        workspace_id: &str,
        id: BlueprintId,
    ) -> StoreResult<Option<Blueprint>> {
        Ok(self
            .tables
            .blueprints
            .get(&(workspace_id.to_string(), id))
            .map(|row| row.blueprint.clone()))
    }

    fn get_blueprint_by_id_and_type(
        &self,
        workspace_id: &str,
        id: BlueprintId,
        project_id: ProjectId,
        blueprint_type: BlueprintType,
    ) -> StoreResult<Option<Blueprint>> {
        Ok(self
            .get_blueprint_by_id(workspace_id, id)?
            .filter(|b| b.project_id == project_id && b.blueprint_type == blueprint_type))
    }

    fn get_latest_blueprint(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_type: BlueprintType,
    ) -> StoreResult<Option<Blueprint>> {
        Ok(self
            .tables
            .blueprints_in(workspace_id, project_id)
            .rev()
            .find(|b| b.blueprint_type == blueprint_type)
            .cloned())
    }

    fn get_blueprint_kinds(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        ids: &[BlueprintId],
    ) -> StoreResult<Vec<(BlueprintId, BlueprintType)>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tables.blueprints.get(&(workspace_id.to_string(), *id)))
            .filter(|row| row.project_id == project_id)
            .map(|row| (row.blueprint.id, row.blueprint.blueprint_type))
            .collect())
    }

    fn get_blueprint_history(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        limit: u32,
        offset: u64,
    ) -> StoreResult<Vec<Blueprint>> {
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self
            .tables
            .blueprints_in(workspace_id, project_id)
            .rev()
            .filter(|b| b.blueprint_type == BlueprintType::Blueprint)
            .skip(skip)
            .take(take)
            .map(|b| {
                b.clone()
                    .with_envs(self.tables.env_names_for(workspace_id, b.id))
            })
            .collect())
    }

    fn count_blueprints(&self, workspace_id: &str, project_id: ProjectId) -> StoreResult<u64> {
        let count = self
            .tables
            .blueprints_in(workspace_id, project_id)
            .filter(|b| b.blueprint_type == BlueprintType::Blueprint)
            .count();
        Ok(count as u64)
    }

    fn close_values_for_keys(
        &mut self,
        workspace_id: &str,
        project_id: ProjectId,
        valid_to: BlueprintId,
        keys: &[String],
    ) -> StoreResult<usize> {
        let (tables, undo) = self.tables_mut()?;
        let mut closed = 0;
        for (index, row) in tables.values.iter_mut().enumerate() {
            if row.workspace_id == workspace_id
                && row.value.project_id == project_id
                && row.value.is_open()
                && keys.contains(&row.value.key)
            {
                row.value.valid_to = Some(valid_to);
                undo.push(Undo::ValueClosed(index));
                closed += 1;
            }
        }
        Ok(closed)
    }

    fn batch_insert_values(
        &mut self,
        workspace_id: &str,
        _config_id: ConfigId,
        values: &[ConfigValue],
    ) -> StoreResult<()> {
        let (tables, undo) = self.tables_mut()?;
        for value in values {
            let clash = tables.values.iter().find(|row| {
                row.workspace_id == workspace_id
                    && (row.value.id == value.id
                        || (value.is_open()
                            && row.value.is_open()
                            && row.value.project_id == value.project_id
                            && row.value.key == value.key))
            });
            if let Some(existing) = clash {
                return Err(StoreError::Conflict(if existing.value.id == value.id {
                    format!("value '{}' already exists", value.id)
                } else {
                    format!("key '{}' already has an open row", value.key)
                }));
            }
            tables.values.push(ValueRow {
                workspace_id: workspace_id.to_string(),
                value: value.clone(),
            });
            undo.push(Undo::ValueInserted);
        }
        Ok(())
    }

    fn get_effective_values(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<ConfigValue>> {
        Ok(self
            .tables
            .values_in(workspace_id, project_id)
            .filter(|v| v.is_effective_at(blueprint_id))
            .cloned()
            .collect())
    }

    fn get_delta_values(
        &self,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<ConfigValue>> {
        Ok(self
            .tables
            .values
            .iter()
            .filter(|row| row.workspace_id == workspace_id && row.value.is_introduced_by(blueprint_id))
            .map(|row| row.value.clone())
            .collect())
    }

    fn list_value_rows(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
    ) -> StoreResult<Vec<ConfigValue>> {
        Ok(self.tables.values_in(workspace_id, project_id).cloned().collect())
    }

    fn get_blueprint_id_by_env(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        env_name: &str,
    ) -> StoreResult<Option<BlueprintId>> {
        Ok(self
            .tables
            .envs
            .iter()
            .find(|row| {
                row.workspace_id == workspace_id
                    && row.binding.project_id == project_id
                    && row.binding.env_name == env_name
            })
            .map(|row| row.binding.blueprint_id))
    }

    fn get_envs_by_blueprint(
        &self,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<String>> {
        Ok(self.tables.env_names_for(workspace_id, blueprint_id))
    }

    fn get_envs_by_names(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        env_names: &[String],
    ) -> StoreResult<Vec<EnvironmentBinding>> {
        Ok(self
            .tables
            .envs
            .iter()
            .filter(|row| {
                row.workspace_id == workspace_id
                    && row.binding.project_id == project_id
                    && env_names.contains(&row.binding.env_name)
            })
            .map(|row| row.binding.clone())
            .collect())
    }

    fn batch_insert_envs(
        &mut self,
        workspace_id: &str,
        envs: &[EnvironmentBinding],
    ) -> StoreResult<()> {
        let (tables, undo) = self.tables_mut()?;
        for env in envs {
            if tables.envs.iter().any(|row| {
                row.workspace_id == workspace_id
                    && (row.binding.id == env.id
                        || (row.binding.project_id == env.project_id
                            && row.binding.env_name == env.env_name))
            }) {
                return Err(StoreError::Conflict(format!(
                    "environment '{}' already exists",
                    env.env_name
                )));
            }
            tables.envs.push(EnvRow {
                workspace_id: workspace_id.to_string(),
                binding: env.clone(),
            });
            undo.push(Undo::EnvInserted);
        }
        Ok(())
    }

    fn batch_update_envs(
        &mut self,
        workspace_id: &str,
        project_id: ProjectId,
        updated_by: &str,
        updated_at: DateTime<Utc>,
        envs: &[EnvBinding],
    ) -> StoreResult<usize> {
        let (tables, undo) = self.tables_mut()?;
        let mut updated = 0;
        for env in envs {
            let found = tables.envs.iter_mut().enumerate().find(|(_, row)| {
                row.workspace_id == workspace_id
                    && row.binding.project_id == project_id
                    && row.binding.env_name == env.env_name
            });
            if let Some((index, row)) = found {
                undo.push(Undo::EnvUpdated(index, row.binding.clone()));
                row.binding.blueprint_id = env.blueprint_id;
                row.binding.last_updated_by = updated_by.to_string();
                row.binding.last_updated_at = updated_at;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
