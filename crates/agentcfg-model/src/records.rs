//! Persisted records
//!
//! These are the shapes the stores hand back. Workspace scoping is carried by
//! the store, not by the records.

use crate::ids::{BlueprintId, ConfigId, EnvId, ProjectId, ValueId};
use crate::kinds::{BlueprintType, ValueType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project as known to the project directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier
    pub id: ProjectId,
    /// Unique (per workspace) project name
    pub name: String,
}

/// Per-project container for blueprints, masks and environments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: ConfigId,
    pub project_id: ProjectId,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_by: String,
    pub last_updated_at: DateTime<Utc>,
}

/// One configuration version (or mask overlay)
///
/// `envs` and `values` are only populated by the read paths that resolve
/// them; the stores return bare records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: BlueprintId,
    pub project_id: ProjectId,
    #[serde(rename = "type")]
    pub blueprint_type: BlueprintType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_by: String,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ConfigValue>,
}

impl Blueprint {
    /// Replace the attached values
    #[inline]
    #[must_use]
    pub fn with_values(mut self, values: Vec<ConfigValue>) -> Self {
        self.values = values;
        self
    }

    /// Replace the attached environment names
    #[inline]
    #[must_use]
    pub fn with_envs(mut self, envs: Vec<String>) -> Self {
        self.envs = envs;
        self
    }

    /// Whether this record is a mask overlay
    #[inline]
    #[must_use]
    pub fn is_mask(&self) -> bool {
        self.blueprint_type == BlueprintType::Mask
    }

    /// Look up an attached value by key
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        self.values.iter().find(|v| v.key == key)
    }
}

/// A key/value row valid over `[valid_from, valid_to)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub id: ValueId,
    pub project_id: ProjectId,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub valid_from: BlueprintId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<BlueprintId>,
}

impl ConfigValue {
    /// Row has not been superseded
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Row is the active value for its key as of `blueprint`
    #[inline]
    #[must_use]
    pub fn is_effective_at(&self, blueprint: BlueprintId) -> bool {
        self.valid_from <= blueprint && self.valid_to.map_or(true, |to| to > blueprint)
    }

    /// Row was introduced by `blueprint`
    #[inline]
    #[must_use]
    pub fn is_introduced_by(&self, blueprint: BlueprintId) -> bool {
        self.valid_from == blueprint
    }
}

/// Environment name pinned to a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBinding {
    pub id: EnvId,
    pub project_id: ProjectId,
    pub config_id: ConfigId,
    pub env_name: String,
    pub blueprint_id: BlueprintId,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_by: String,
    pub last_updated_at: DateTime<Utc>,
}

/// One page of blueprint history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintPage {
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub content: Vec<Blueprint>,
}
