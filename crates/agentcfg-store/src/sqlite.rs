//! `SQLite` store
//!
//! Identifiers are stored as their 26-character ULID text, so lexical order
//! in SQL equals creation order. Timestamps are RFC 3339 text in UTC.
//!
//! Write units of work open with `BEGIN IMMEDIATE`; read units use deferred
//! transactions. A partial unique index enforces one open value row per
//! (workspace, project, key).

use crate::contract::{ConfigStore, StoreTx, TxMode};
use crate::error::{StoreError, StoreResult};
use agentcfg_model::{
    AgentConfig, Blueprint, BlueprintId, BlueprintType, ConfigId, ConfigValue, EnvBinding,
    EnvironmentBinding, ProjectId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agent_configs (
    workspace_id TEXT NOT NULL,
    id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_updated_by TEXT NOT NULL,
    last_updated_at TEXT NOT NULL,
    PRIMARY KEY (workspace_id, id),
    UNIQUE (workspace_id, project_id)
);
CREATE TABLE IF NOT EXISTS agent_blueprints (
    workspace_id TEXT NOT NULL,
    id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    config_id TEXT NOT NULL,
    type TEXT NOT NULL,
    description TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_updated_by TEXT NOT NULL,
    last_updated_at TEXT NOT NULL,
    PRIMARY KEY (workspace_id, id)
);
CREATE INDEX IF NOT EXISTS idx_agent_blueprints_project_type
    ON agent_blueprints (workspace_id, project_id, type, id);
CREATE TABLE IF NOT EXISTS agent_config_values (
    workspace_id TEXT NOT NULL,
    id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    config_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    type TEXT NOT NULL,
    description TEXT,
    valid_from TEXT NOT NULL,
    valid_to TEXT,
    PRIMARY KEY (workspace_id, id)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_agent_config_values_open_key
    ON agent_config_values (workspace_id, project_id, key) WHERE valid_to IS NULL;
CREATE INDEX IF NOT EXISTS idx_agent_config_values_validity
    ON agent_config_values (workspace_id, project_id, key, valid_from, valid_to);
CREATE INDEX IF NOT EXISTS idx_agent_config_values_valid_from
    ON agent_config_values (workspace_id, valid_from);
CREATE TABLE IF NOT EXISTS agent_config_envs (
    workspace_id TEXT NOT NULL,
    id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    config_id TEXT NOT NULL,
    env_name TEXT NOT NULL,
    blueprint_id TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_updated_by TEXT NOT NULL,
    last_updated_at TEXT NOT NULL,
    PRIMARY KEY (workspace_id, id),
    UNIQUE (workspace_id, project_id, env_name)
);
CREATE INDEX IF NOT EXISTS idx_agent_config_envs_blueprint
    ON agent_config_envs (workspace_id, blueprint_id);
";

const CONFIG_COLUMNS: &str =
    "id, project_id, created_by, created_at, last_updated_by, last_updated_at";
const BLUEPRINT_COLUMNS: &str = "id, project_id, type, description, created_by, created_at, \
     last_updated_by, last_updated_at";
const VALUE_COLUMNS: &str =
    "id, project_id, key, value, type, description, valid_from, valid_to";
const ENV_COLUMNS: &str = "id, project_id, config_id, env_name, blueprint_id, created_by, \
     created_at, last_updated_by, last_updated_at";

/// Configuration for [`SqliteStore`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Database file path
    pub path: PathBuf,
    /// Busy timeout in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Config for a database file with default timeouts
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// With busy timeout
    #[inline]
    #[must_use]
    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// [`ConfigStore`] backed by a single `SQLite` connection
#[derive(Debug)]
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database and apply the schema
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or the schema cannot be applied
    pub fn open(config: &SqliteStoreConfig) -> StoreResult<Self> {
        if config.path.is_dir() {
            return Err(StoreError::Backend(format!(
                "store path '{}' is a directory",
                config.path.display()
            )));
        }
        let connection = Connection::open(&config.path)?;
        connection.execute_batch("PRAGMA journal_mode = wal;")?;
        connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        tracing::debug!("Opened sqlite store at {}", config.path.display());
        Self::with_connection(connection)
    }

    /// Open a database file with default settings
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or the schema cannot be applied
    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&SqliteStoreConfig::new(path.as_ref()))
    }

    /// Private in-memory database
    ///
    /// # Errors
    /// Returns error if the schema cannot be applied
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut connection: Connection) -> StoreResult<Self> {
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

fn initialize_schema(connection: &mut Connection) -> StoreResult<()> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    match version {
        0 => {
            tx.execute_batch(SCHEMA)?;
            tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        }
        SCHEMA_VERSION => {}
        other => {
            return Err(StoreError::Backend(format!(
                "unsupported schema version {other}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(message.unwrap_or_else(|| failure.to_string()))
            }
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                Self::Corrupt(format!("column {column}: {source}"))
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

impl ConfigStore for SqliteStore {
    fn in_transaction<T, E, F>(&self, mode: TxMode, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let behavior = match mode {
            TxMode::Read => TransactionBehavior::Deferred,
            TxMode::Write => TransactionBehavior::Immediate,
        };

        let mut guard = self.connection.lock();
        let tx = guard
            .transaction_with_behavior(behavior)
            .map_err(|err| E::from(StoreError::from(err)))?;

        let result = {
            let mut store_tx = SqliteTx {
                connection: &*tx,
                mode,
            };
            f(&mut store_tx)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(|err| E::from(StoreError::from(err)))?;
                Ok(value)
            }
            // Dropping the transaction rolls it back.
            Err(err) => Err(err),
        }
    }
}

struct SqliteTx<'a> {
    connection: &'a Connection,
    mode: TxMode,
}

impl SqliteTx<'_> {
    fn writable(&self) -> StoreResult<&Connection> {
        match self.mode {
            TxMode::Read => Err(StoreError::ReadOnly),
            TxMode::Write => Ok(self.connection),
        }
    }

    fn query_values(&self, sql: &str, args: &[String]) -> StoreResult<Vec<ConfigValue>> {
        let mut stmt = self.connection.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args), value_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parsed<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(index)?;
    text.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn parsed_opt<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(index)?;
    text.map(|t| {
        t.parse()
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
    })
    .transpose()
}

fn time_at(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<AgentConfig> {
    Ok(AgentConfig {
        id: parsed(row, 0)?,
        project_id: parsed(row, 1)?,
        created_by: row.get(2)?,
        created_at: time_at(row, 3)?,
        last_updated_by: row.get(4)?,
        last_updated_at: time_at(row, 5)?,
    })
}

fn blueprint_from_row(row: &Row<'_>) -> rusqlite::Result<Blueprint> {
    Ok(Blueprint {
        id: parsed(row, 0)?,
        project_id: parsed(row, 1)?,
        blueprint_type: parsed(row, 2)?,
        description: row.get(3)?,
        envs: Vec::new(),
        created_by: row.get(4)?,
        created_at: time_at(row, 5)?,
        last_updated_by: row.get(6)?,
        last_updated_at: time_at(row, 7)?,
        values: Vec::new(),
    })
}

fn value_from_row(row: &Row<'_>) -> rusqlite::Result<ConfigValue> {
    Ok(ConfigValue {
        id: parsed(row, 0)?,
        project_id: parsed(row, 1)?,
        key: row.get(2)?,
        value: row.get(3)?,
        value_type: parsed(row, 4)?,
        description: row.get(5)?,
        valid_from: parsed(row, 6)?,
        valid_to: parsed_opt(row, 7)?,
    })
}

fn env_from_row(row: &Row<'_>) -> rusqlite::Result<EnvironmentBinding> {
    Ok(EnvironmentBinding {
        id: parsed(row, 0)?,
        project_id: parsed(row, 1)?,
        config_id: parsed(row, 2)?,
        env_name: row.get(3)?,
        blueprint_id: parsed(row, 4)?,
        created_by: row.get(5)?,
        created_at: time_at(row, 6)?,
        last_updated_by: row.get(7)?,
        last_updated_at: time_at(row, 8)?,
    })
}

impl StoreTx for SqliteTx<'_> {
    fn get_config_by_project(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
    ) -> StoreResult<Option<AgentConfig>> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM agent_configs WHERE workspace_id = ?1 AND project_id = ?2"
        );
        Ok(self
            .connection
            .query_row(&sql, params![workspace_id, project_id.to_string()], config_from_row)
            .optional()?)
    }

    fn get_config_by_id(&self, workspace_id: &str, id: ConfigId) -> StoreResult<Option<AgentConfig>> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM agent_configs WHERE workspace_id = ?1 AND id = ?2"
        );
        Ok(self
            .connection
            .query_row(&sql, params![workspace_id, id.to_string()], config_from_row)
            .optional()?)
    }

    fn insert_config(&mut self, workspace_id: &str, config: &AgentConfig) -> StoreResult<()> {
        self.writable()?.execute(
            "INSERT INTO agent_configs (workspace_id, id, project_id, created_by, created_at, \
             last_updated_by, last_updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                workspace_id,
                config.id.to_string(),
                config.project_id.to_string(),
                config.created_by,
                timestamp(&config.created_at),
                config.last_updated_by,
                timestamp(&config.last_updated_at),
            ],
        )?;
        Ok(())
    }

    fn insert_blueprint(
        &mut self,
        workspace_id: &str,
        config_id: ConfigId,
        blueprint: &Blueprint,
    ) -> StoreResult<()> {
        self.writable()?.execute(
            "INSERT INTO agent_blueprints (workspace_id, id, project_id, config_id, type, \
             description, created_by, created_at, last_updated_by, last_updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                workspace_id,
                blueprint.id.to_string(),
                blueprint.project_id.to_string(),
                config_id.to_string(),
                blueprint.blueprint_type.as_str(),
                blueprint.description,
                blueprint.created_by,
                timestamp(&blueprint.created_at),
                blueprint.last_updated_by,
                timestamp(&blueprint.last_updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_blueprint_by_id(
        &self,
        workspace_id: &str,
        id: BlueprintId,
    ) -> StoreResult<Option<Blueprint>> {
        let sql = format!(
            "SELECT {BLUEPRINT_COLUMNS} FROM agent_blueprints WHERE workspace_id = ?1 AND id = ?2"
        );
        Ok(self
            .connection
            .query_row(&sql, params![workspace_id, id.to_string()], blueprint_from_row)
            .optional()?)
    }

    fn get_blueprint_by_id_and_type(
        &self,
        workspace_id: &str,
        id: BlueprintId,
        project_id: ProjectId,
        blueprint_type: BlueprintType,
    ) -> StoreResult<Option<Blueprint>> {
        let sql = format!(
            "SELECT {BLUEPRINT_COLUMNS} FROM agent_blueprints \
             WHERE workspace_id = ?1 AND id = ?2 AND project_id = ?3 AND type = ?4"
        );
        Ok(self
            .connection
            .query_row(
                &sql,
                params![
                    workspace_id,
                    id.to_string(),
                    project_id.to_string(),
                    blueprint_type.as_str()
                ],
                blueprint_from_row,
            )
            .optional()?)
    }

    fn get_latest_blueprint(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_type: BlueprintType,
    ) -> StoreResult<Option<Blueprint>> {
        let sql = format!(
            "SELECT {BLUEPRINT_COLUMNS} FROM agent_blueprints \
             WHERE workspace_id = ?1 AND project_id = ?2 AND type = ?3 \
             ORDER BY id DESC LIMIT 1"
        );
        Ok(self
            .connection
            .query_row(
                &sql,
                params![workspace_id, project_id.to_string(), blueprint_type.as_str()],
                blueprint_from_row,
            )
            .optional()?)
    }

    fn get_blueprint_kinds(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        ids: &[BlueprintId],
    ) -> StoreResult<Vec<(BlueprintId, BlueprintType)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, type FROM agent_blueprints \
             WHERE workspace_id = ? AND project_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let mut args = vec![workspace_id.to_string(), project_id.to_string()];
        args.extend(ids.iter().map(ToString::to_string));

        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(&args), |row| {
            Ok((parsed::<BlueprintId>(row, 0)?, parsed::<BlueprintType>(row, 1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_blueprint_history(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        limit: u32,
        offset: u64,
    ) -> StoreResult<Vec<Blueprint>> {
        let offset = i64::try_from(offset)
            .map_err(|_| StoreError::Backend(format!("offset {offset} out of range")))?;
        let sql = format!(
            "SELECT {BLUEPRINT_COLUMNS} FROM agent_blueprints \
             WHERE workspace_id = ?1 AND project_id = ?2 AND type = ?3 \
             ORDER BY id DESC LIMIT ?4 OFFSET ?5"
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                workspace_id,
                project_id.to_string(),
                BlueprintType::Blueprint.as_str(),
                i64::from(limit),
                offset
            ],
            blueprint_from_row,
        )?;
        let blueprints = rows.collect::<Result<Vec<_>, _>>()?;

        blueprints
            .into_iter()
            .map(|b| {
                let envs = self.get_envs_by_blueprint(workspace_id, b.id)?;
                Ok(b.with_envs(envs))
            })
            .collect()
    }

    fn count_blueprints(&self, workspace_id: &str, project_id: ProjectId) -> StoreResult<u64> {
        let count: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM agent_blueprints \
             WHERE workspace_id = ?1 AND project_id = ?2 AND type = ?3",
            params![workspace_id, project_id.to_string(), BlueprintType::Blueprint.as_str()],
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
    }

    fn close_values_for_keys(
        &mut self,
        workspace_id: &str,
        project_id: ProjectId,
        valid_to: BlueprintId,
        keys: &[String],
    ) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE agent_config_values SET valid_to = ? \
             WHERE workspace_id = ? AND project_id = ? AND valid_to IS NULL AND key IN ({})",
            placeholders(keys.len())
        );
        let mut args = vec![
            valid_to.to_string(),
            workspace_id.to_string(),
            project_id.to_string(),
        ];
        args.extend(keys.iter().cloned());
        Ok(self.writable()?.execute(&sql, params_from_iter(&args))?)
    }

    fn batch_insert_values(
        &mut self,
        workspace_id: &str,
        config_id: ConfigId,
        values: &[ConfigValue],
    ) -> StoreResult<()> {
        let connection = self.writable()?;
        let mut stmt = connection.prepare_cached(
            "INSERT INTO agent_config_values (workspace_id, id, project_id, config_id, key, \
             value, type, description, valid_from, valid_to) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for value in values {
            stmt.execute(params![
                workspace_id,
                value.id.to_string(),
                value.project_id.to_string(),
                config_id.to_string(),
                value.key,
                value.value,
                value.value_type.as_str(),
                value.description,
                value.valid_from.to_string(),
                value.valid_to.map(|id| id.to_string()),
            ])?;
        }
        Ok(())
    }

    fn get_effective_values(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<ConfigValue>> {
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM agent_config_values \
             WHERE workspace_id = ?1 AND project_id = ?2 AND valid_from <= ?3 \
             AND (valid_to IS NULL OR valid_to > ?3)"
        );
        self.query_values(
            &sql,
            &[
                workspace_id.to_string(),
                project_id.to_string(),
                blueprint_id.to_string(),
            ],
        )
    }

    fn get_delta_values(
        &self,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<ConfigValue>> {
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM agent_config_values \
             WHERE workspace_id = ?1 AND valid_from = ?2"
        );
        self.query_values(&sql, &[workspace_id.to_string(), blueprint_id.to_string()])
    }

    fn list_value_rows(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
    ) -> StoreResult<Vec<ConfigValue>> {
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM agent_config_values \
             WHERE workspace_id = ?1 AND project_id = ?2 ORDER BY key, valid_from"
        );
        self.query_values(&sql, &[workspace_id.to_string(), project_id.to_string()])
    }

    fn get_blueprint_id_by_env(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        env_name: &str,
    ) -> StoreResult<Option<BlueprintId>> {
        let id: Option<String> = self
            .connection
            .query_row(
                "SELECT blueprint_id FROM agent_config_envs \
                 WHERE workspace_id = ?1 AND project_id = ?2 AND env_name = ?3",
                params![workspace_id, project_id.to_string(), env_name],
                |row| row.get(0),
            )
            .optional()?;
        id.map(|text| {
            text.parse()
                .map_err(|err| StoreError::Corrupt(format!("env '{env_name}': {err}")))
        })
        .transpose()
    }

    fn get_envs_by_blueprint(
        &self,
        workspace_id: &str,
        blueprint_id: BlueprintId,
    ) -> StoreResult<Vec<String>> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT env_name FROM agent_config_envs \
             WHERE workspace_id = ?1 AND blueprint_id = ?2 ORDER BY env_name",
        )?;
        let rows = stmt.query_map(params![workspace_id, blueprint_id.to_string()], |row| {
            row.get(0)
        })?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn get_envs_by_names(
        &self,
        workspace_id: &str,
        project_id: ProjectId,
        env_names: &[String],
    ) -> StoreResult<Vec<EnvironmentBinding>> {
        if env_names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {ENV_COLUMNS} FROM agent_config_envs \
             WHERE workspace_id = ? AND project_id = ? AND env_name IN ({})",
            placeholders(env_names.len())
        );
        let mut args = vec![workspace_id.to_string(), project_id.to_string()];
        args.extend(env_names.iter().cloned());

        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(&args), env_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn batch_insert_envs(
        &mut self,
        workspace_id: &str,
        envs: &[EnvironmentBinding],
    ) -> StoreResult<()> {
        let connection = self.writable()?;
        let mut stmt = connection.prepare_cached(
            "INSERT INTO agent_config_envs (workspace_id, id, project_id, config_id, env_name, \
             blueprint_id, created_by, created_at, last_updated_by, last_updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for env in envs {
            stmt.execute(params![
                workspace_id,
                env.id.to_string(),
                env.project_id.to_string(),
                env.config_id.to_string(),
                env.env_name,
                env.blueprint_id.to_string(),
                env.created_by,
                timestamp(&env.created_at),
                env.last_updated_by,
                timestamp(&env.last_updated_at),
            ])?;
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
        let connection = self.writable()?;
        let mut stmt = connection.prepare_cached(
            "UPDATE agent_config_envs \
             SET blueprint_id = ?1, last_updated_by = ?2, last_updated_at = ?3 \
             WHERE workspace_id = ?4 AND project_id = ?5 AND env_name = ?6",
        )?;
        let at = timestamp(&updated_at);
        let mut updated = 0;
        for env in envs {
            updated += stmt.execute(params![
                env.blueprint_id.to_string(),
                updated_by,
                at,
                workspace_id,
                project_id.to_string(),
                env.env_name,
            ])?;
        }
        Ok(updated)
    }
}
