//! Request validation
//!
//! Everything here runs before any store access. A request that fails
//! validation has no effect.

use crate::ids::{BlueprintId, ConfigId};
use crate::request::{BlueprintDraft, CreateConfigRequest, EnvUpdateRequest, ProjectRef};
use std::collections::HashSet;

/// Maximum characters in a value key
pub const MAX_KEY_LEN: usize = 255;
/// Maximum characters in a value
pub const MAX_VALUE_LEN: usize = 512;
/// Maximum characters in a blueprint description
pub const MAX_DESCRIPTION_LEN: usize = 255;
/// Minimum values per blueprint
pub const MIN_VALUES: usize = 1;
/// Maximum values per blueprint
pub const MAX_VALUES: usize = 250;
/// Maximum characters in an environment name
pub const MAX_ENV_NAME_LEN: usize = 50;
/// Minimum bindings per environment update
pub const MIN_ENVS: usize = 1;
/// Maximum bindings per environment update
pub const MAX_ENVS: usize = 100;

/// Malformed or constraint-violating input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Neither project ID nor name supplied
    #[error("either project_id or project_name must be provided")]
    MissingProject,

    /// Both project ID and name supplied
    #[error("only one of project_id or project_name may be provided")]
    AmbiguousProject,

    /// Required text is empty or whitespace
    #[error("{field} must not be blank")]
    Blank { field: String },

    /// Text exceeds its length bound
    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: String, max: usize },

    /// Blueprint value count out of bounds
    #[error("blueprint must have between {min} and {max} values, got {actual}")]
    ValueCount { min: usize, max: usize, actual: usize },

    /// Same key submitted twice in one blueprint
    #[error("duplicate key '{0}' in blueprint values")]
    DuplicateKey(String),

    /// Environment binding count out of bounds
    #[error("envs must contain between {min} and {max} items, got {actual}")]
    EnvCount { min: usize, max: usize, actual: usize },

    /// Same environment submitted twice in one request
    #[error("duplicate environment '{0}' in request")]
    DuplicateEnv(String),

    /// Page number below 1
    #[error("page must be at least 1, got {0}")]
    InvalidPage(u32),

    /// Page size below 1
    #[error("size must be at least 1, got {0}")]
    InvalidPageSize(u32),

    /// Caller-supplied blueprint ID is already in use
    #[error("blueprint id '{0}' already exists")]
    BlueprintIdTaken(BlueprintId),

    /// Caller-supplied blueprint ID would precede existing history
    #[error("blueprint id '{requested}' must be newer than latest blueprint '{latest}'")]
    BlueprintIdNotNewer {
        requested: BlueprintId,
        latest: BlueprintId,
    },

    /// Caller-supplied blueprint ID is stamped too far ahead of the clock
    #[error("blueprint id '{requested}' is timestamped more than {max_skew_ms} ms in the future")]
    BlueprintIdInFuture {
        requested: BlueprintId,
        max_skew_ms: u64,
    },

    /// Caller-supplied config ID already belongs to another project
    #[error("config id '{0}' already exists")]
    ConfigIdTaken(ConfigId),
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn check_text(field: impl Fn() -> String, value: &str, max: usize) -> Result<(), ValidationError> {
    if is_blank(value) {
        return Err(ValidationError::Blank { field: field() });
    }
    check_len(field, value, max)
}

fn check_len(field: impl Fn() -> String, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field: field(), max });
    }
    Ok(())
}

impl BlueprintDraft {
    /// Validate bounds, blank fields and key uniqueness
    ///
    /// # Errors
    /// Returns the first violation found
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(description) = &self.description {
            check_len(|| "description".to_string(), description, MAX_DESCRIPTION_LEN)?;
        }

        let count = self.values.len();
        if !(MIN_VALUES..=MAX_VALUES).contains(&count) {
            return Err(ValidationError::ValueCount {
                min: MIN_VALUES,
                max: MAX_VALUES,
                actual: count,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for (index, value) in self.values.iter().enumerate() {
            check_text(|| format!("values[{index}].key"), &value.key, MAX_KEY_LEN)?;
            check_text(|| format!("values[{index}].value"), &value.value, MAX_VALUE_LEN)?;
            if !seen.insert(value.key.as_str()) {
                return Err(ValidationError::DuplicateKey(value.key.clone()));
            }
        }

        Ok(())
    }
}

impl CreateConfigRequest {
    /// Validate the request and decide how the project is referenced
    ///
    /// # Errors
    /// Returns the first violation found
    pub fn validate(&self) -> Result<ProjectRef, ValidationError> {
        let project = match (&self.project_id, &self.project_name) {
            (Some(_), Some(_)) => return Err(ValidationError::AmbiguousProject),
            (None, None) => return Err(ValidationError::MissingProject),
            (Some(id), None) => ProjectRef::Id(*id),
            (None, Some(name)) => {
                if is_blank(name) {
                    return Err(ValidationError::Blank {
                        field: "project_name".to_string(),
                    });
                }
                ProjectRef::Name(name.clone())
            }
        };

        self.blueprint.validate()?;
        Ok(project)
    }
}

impl EnvUpdateRequest {
    /// Validate batch size, names and name uniqueness
    ///
    /// # Errors
    /// Returns the first violation found
    pub fn validate(&self) -> Result<(), ValidationError> {
        let count = self.envs.len();
        if !(MIN_ENVS..=MAX_ENVS).contains(&count) {
            return Err(ValidationError::EnvCount {
                min: MIN_ENVS,
                max: MAX_ENVS,
                actual: count,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for (index, env) in self.envs.iter().enumerate() {
            check_text(|| format!("envs[{index}].env_name"), &env.env_name, MAX_ENV_NAME_LEN)?;
            if !seen.insert(env.env_name.as_str()) {
                return Err(ValidationError::DuplicateEnv(env.env_name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ProjectId;
    use crate::kinds::ValueType;
    use crate::request::{EnvBinding, NewValue};
    use pretty_assertions::assert_eq;

    fn value(key: &str) -> NewValue {
        NewValue::new(key, "v", ValueType::String)
    }

    fn draft(values: Vec<NewValue>) -> BlueprintDraft {
        BlueprintDraft::blueprint(values)
    }

    #[test]
    fn project_reference_must_be_exactly_one() {
        let both = CreateConfigRequest {
            project_id: Some(ProjectId::new()),
            project_name: Some("p".into()),
            config_id: None,
            blueprint: draft(vec![value("a")]),
        };
        assert_eq!(both.validate(), Err(ValidationError::AmbiguousProject));

        let neither = CreateConfigRequest {
            project_id: None,
            project_name: None,
            ..both.clone()
        };
        assert_eq!(neither.validate(), Err(ValidationError::MissingProject));

        let blank = CreateConfigRequest::for_project_name("  ", draft(vec![value("a")]));
        assert!(matches!(blank.validate(), Err(ValidationError::Blank { .. })));
    }

    #[test]
    fn project_reference_resolves() {
        let id = ProjectId::new();
        let by_id = CreateConfigRequest::for_project(id, draft(vec![value("a")]));
        assert_eq!(by_id.validate(), Ok(ProjectRef::Id(id)));

        let by_name = CreateConfigRequest::for_project_name("bot", draft(vec![value("a")]));
        assert_eq!(by_name.validate(), Ok(ProjectRef::Name("bot".into())));
    }

    #[test]
    fn value_count_bounds() {
        assert!(matches!(
            draft(vec![]).validate(),
            Err(ValidationError::ValueCount { actual: 0, .. })
        ));

        let many: Vec<NewValue> = (0..=MAX_VALUES).map(|i| value(&format!("k{i}"))).collect();
        assert!(matches!(
            draft(many).validate(),
            Err(ValidationError::ValueCount { actual: 251, .. })
        ));

        let max: Vec<NewValue> = (0..MAX_VALUES).map(|i| value(&format!("k{i}"))).collect();
        assert!(draft(max).validate().is_ok());
    }

    #[test]
    fn blank_and_long_fields_are_rejected() {
        let blank_value = draft(vec![NewValue::new("k", " ", ValueType::String)]);
        assert_eq!(
            blank_value.validate(),
            Err(ValidationError::Blank {
                field: "values[0].value".into()
            })
        );

        let long_key = draft(vec![value(&"k".repeat(MAX_KEY_LEN + 1))]);
        assert_eq!(
            long_key.validate(),
            Err(ValidationError::TooLong {
                field: "values[0].key".into(),
                max: MAX_KEY_LEN
            })
        );

        let long_value = draft(vec![NewValue::new("k", "v".repeat(513), ValueType::Prompt)]);
        assert!(matches!(long_value.validate(), Err(ValidationError::TooLong { max: 512, .. })));

        let long_description = draft(vec![value("a")]).with_description("d".repeat(256));
        assert!(matches!(
            long_description.validate(),
            Err(ValidationError::TooLong { max: 255, .. })
        ));
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let key = "é".repeat(MAX_KEY_LEN);
        assert!(draft(vec![value(&key)]).validate().is_ok());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let dup = draft(vec![value("model"), value("temperature"), value("model")]);
        assert_eq!(dup.validate(), Err(ValidationError::DuplicateKey("model".into())));
    }

    #[test]
    fn env_update_bounds_and_names() {
        let id = BlueprintId::from_ulid(ulid::Ulid::new());
        let project = ProjectId::new();

        assert!(matches!(
            EnvUpdateRequest::new(project, vec![]).validate(),
            Err(ValidationError::EnvCount { actual: 0, .. })
        ));

        let too_many: Vec<EnvBinding> = (0..=MAX_ENVS)
            .map(|i| EnvBinding::new(format!("env{i}"), id))
            .collect();
        assert!(matches!(
            EnvUpdateRequest::new(project, too_many).validate(),
            Err(ValidationError::EnvCount { actual: 101, .. })
        ));

        let long = EnvUpdateRequest::new(project, vec![EnvBinding::new("e".repeat(51), id)]);
        assert!(matches!(long.validate(), Err(ValidationError::TooLong { max: 50, .. })));

        let dup = EnvUpdateRequest::new(
            project,
            vec![EnvBinding::new("prod", id), EnvBinding::new("prod", id)],
        );
        assert_eq!(dup.validate(), Err(ValidationError::DuplicateEnv("prod".into())));

        let ok = EnvUpdateRequest::new(project, vec![EnvBinding::new("prod", id)]);
        assert!(ok.validate().is_ok());
    }
}
