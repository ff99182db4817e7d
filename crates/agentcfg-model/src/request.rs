//! Write and read request types

use crate::ids::{BlueprintId, ConfigId, ProjectId};
use crate::kinds::{BlueprintType, ValueType};
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Acting workspace and user for one call
///
/// Scopes every query and stamps `created_by` / `last_updated_by`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub workspace_id: String,
    pub user_name: String,
}

impl RequestIdentity {
    /// Create identity
    #[inline]
    #[must_use]
    pub fn new(workspace_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// How a write request names its project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// Existing project, looked up by ID
    Id(ProjectId),
    /// Project looked up by name, created if absent
    Name(String),
}

/// A value submitted as part of a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewValue {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewValue {
    /// Create value without description
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            value_type,
            description: None,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Blueprint payload of a write request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintDraft {
    /// Caller-chosen blueprint ID; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BlueprintId>,
    #[serde(rename = "type")]
    pub blueprint_type: BlueprintType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub values: Vec<NewValue>,
}

impl BlueprintDraft {
    /// Draft of a history blueprint
    #[inline]
    #[must_use]
    pub fn blueprint(values: Vec<NewValue>) -> Self {
        Self {
            id: None,
            blueprint_type: BlueprintType::Blueprint,
            description: None,
            values,
        }
    }

    /// Draft of a mask overlay
    #[inline]
    #[must_use]
    pub fn mask(values: Vec<NewValue>) -> Self {
        Self {
            blueprint_type: BlueprintType::Mask,
            ..Self::blueprint(values)
        }
    }

    /// With caller-chosen ID
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: BlueprintId) -> Self {
        self.id = Some(id);
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Keys of the submitted values, in submission order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.iter().map(|v| v.key.clone()).collect()
    }
}

/// Request to append a blueprint (or mask) to a project's config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConfigRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Config ID to use if this request creates the project's config
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub config_id: Option<ConfigId>,
    pub blueprint: BlueprintDraft,
}

impl CreateConfigRequest {
    /// Request targeting an existing project
    #[inline]
    #[must_use]
    pub fn for_project(project_id: ProjectId, blueprint: BlueprintDraft) -> Self {
        Self {
            project_id: Some(project_id),
            project_name: None,
            config_id: None,
            blueprint,
        }
    }

    /// Request targeting a project by name
    #[inline]
    #[must_use]
    pub fn for_project_name(project_name: impl Into<String>, blueprint: BlueprintDraft) -> Self {
        Self {
            project_id: None,
            project_name: Some(project_name.into()),
            config_id: None,
            blueprint,
        }
    }

    /// With config ID
    #[inline]
    #[must_use]
    pub fn with_config_id(mut self, config_id: ConfigId) -> Self {
        self.config_id = Some(config_id);
        self
    }
}

/// One environment pin inside an [`EnvUpdateRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    pub env_name: String,
    pub blueprint_id: BlueprintId,
}

impl EnvBinding {
    /// Create binding
    #[inline]
    #[must_use]
    pub fn new(env_name: impl Into<String>, blueprint_id: BlueprintId) -> Self {
        Self {
            env_name: env_name.into(),
            blueprint_id,
        }
    }
}

/// Request to create or re-point environment pins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvUpdateRequest {
    pub project_id: ProjectId,
    pub envs: Vec<EnvBinding>,
}

impl EnvUpdateRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(project_id: ProjectId, envs: Vec<EnvBinding>) -> Self {
        Self { project_id, envs }
    }

    /// Distinct blueprint IDs referenced, in first-seen order
    #[must_use]
    pub fn blueprint_ids(&self) -> Vec<BlueprintId> {
        let mut ids: Vec<BlueprintId> = Vec::with_capacity(self.envs.len());
        for env in &self.envs {
            if !ids.contains(&env.blueprint_id) {
                ids.push(env.blueprint_id);
            }
        }
        ids
    }
}

/// Validated 1-based page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Validate page coordinates
    ///
    /// # Errors
    /// Returns error if `page` or `size` is zero
    pub fn new(page: u32, size: u32) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::InvalidPage(page));
        }
        if size < 1 {
            return Err(ValidationError::InvalidPageSize(size));
        }
        Ok(Self { page, size })
    }

    #[inline]
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Rows to skip before this page
    #[inline]
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn page_offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 10).unwrap().offset(), 0);
        assert_eq!(PageRequest::new(3, 25).unwrap().offset(), 50);
    }

    #[test]
    fn page_rejects_zero() {
        assert_eq!(PageRequest::new(0, 10), Err(ValidationError::InvalidPage(0)));
        assert_eq!(PageRequest::new(1, 0), Err(ValidationError::InvalidPageSize(0)));
    }

    #[test]
    fn env_request_dedups_blueprint_ids() {
        let a = BlueprintId::from_ulid(ulid::Ulid::new());
        let b = BlueprintId::from_ulid(ulid::Ulid::new());
        let request = EnvUpdateRequest::new(
            ProjectId::new(),
            vec![
                EnvBinding::new("dev", a),
                EnvBinding::new("staging", b),
                EnvBinding::new("prod", a),
            ],
        );

        assert_eq!(request.blueprint_ids(), vec![a, b]);
    }

    #[test]
    fn create_request_reads_wire_json() {
        let json = r#"{
            "project_name": "support-bot",
            "blueprint": {
                "type": "blueprint",
                "description": "Initial configuration",
                "values": [
                    {"key": "model", "value": "gpt-4", "type": "string"},
                    {"key": "max_tokens", "value": "1024", "type": "integer", "description": "cap"}
                ]
            }
        }"#;

        let request: CreateConfigRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.project_name.as_deref(), Some("support-bot"));
        assert_eq!(request.blueprint.blueprint_type, BlueprintType::Blueprint);
        assert_eq!(request.blueprint.keys(), vec!["model", "max_tokens"]);
        assert_eq!(
            request.blueprint.values[1].description.as_deref(),
            Some("cap")
        );
    }

    #[test]
    fn create_request_rejects_unknown_blueprint_type() {
        let json = r#"{"project_name": "p", "blueprint": {"type": "draft", "values": []}}"#;
        assert!(serde_json::from_str::<CreateConfigRequest>(json).is_err());
    }
}
