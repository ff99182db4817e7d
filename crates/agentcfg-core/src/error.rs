//! Error types for agent config operations
//!
//! Three outcome classes reach callers:
//! - invalid input, rejected before any store access
//! - unresolvable referents (project, config, blueprint, mask, environment)
//! - internal failures, which are logged at error level where they surface

use crate::directory::ProjectError;
use agentcfg_model::{BlueprintId, ProjectId, ValidationError};
use agentcfg_store::StoreError;

/// Main error type for blueprint operations
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// Malformed or constraint-violating input
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    /// Referenced entity does not exist, has the wrong type, or belongs elsewhere
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Stored state contradicts a versioning invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage backend failure
    #[error("store error: {0}")]
    Store(StoreError),

    /// Project directory failure
    #[error("project directory error: {0}")]
    Directory(String),
}

impl BlueprintError {
    /// Check if a referent could not be resolved
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the input was rejected
    #[inline]
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if the failure is internal to the system
    #[inline]
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation(_) | Self::Store(_) | Self::Directory(_)
        )
    }

    /// Create invariant violation error
    #[inline]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}

impl From<StoreError> for BlueprintError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::InvariantViolation(message),
            other => Self::Store(other),
        }
    }
}

impl From<ProjectError> for BlueprintError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound(project_id) => Self::NotFound(NotFoundError::Project(project_id)),
            ProjectError::Unavailable(message) => Self::Directory(message),
        }
    }
}

/// Unresolvable referent; the message names the failing identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("Project '{0}' not found")]
    Project(ProjectId),

    #[error("No configuration found for project '{0}'")]
    Config(ProjectId),

    #[error("Blueprint '{0}' not found")]
    Blueprint(BlueprintId),

    #[error("No blueprint found for project '{0}'")]
    LatestBlueprint(ProjectId),

    #[error("Mask blueprint '{mask_id}' not found in project '{project_id}'")]
    Mask {
        mask_id: BlueprintId,
        project_id: ProjectId,
    },

    #[error("No blueprint found for environment '{env_name}'")]
    Environment { env_name: String },

    #[error("Environment '{env_name}' is pinned to mask '{mask_id}'")]
    PinnedToMask {
        env_name: String,
        mask_id: BlueprintId,
    },

    #[error("Blueprints not found: [{}]", join_ids(.0))]
    Blueprints(Vec<BlueprintId>),

    #[error("Environments cannot be pinned to masks: [{}]", join_ids(.0))]
    MaskBinding(Vec<BlueprintId>),
}

fn join_ids(ids: &[BlueprintId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn store_conflict_is_internal() {
        let err = BlueprintError::from(StoreError::Conflict("open key".into()));
        assert!(matches!(err, BlueprintError::InvariantViolation(_)));
        assert!(err.is_internal());
        assert!(!err.is_not_found());
    }

    #[test]
    fn project_errors_map_to_classes() {
        let id = ProjectId::new();
        assert!(BlueprintError::from(ProjectError::NotFound(id)).is_not_found());
        assert!(BlueprintError::from(ProjectError::Unavailable("down".into())).is_internal());
    }

    #[test]
    fn not_found_messages_name_identifiers() {
        let project = ProjectId::new();
        let mask = BlueprintId::from_ulid(Ulid::new());
        let err = BlueprintError::from(NotFoundError::Mask {
            mask_id: mask,
            project_id: project,
        });
        assert_eq!(
            err.to_string(),
            format!("Mask blueprint '{mask}' not found in project '{project}'")
        );

        let a = BlueprintId::from_ulid(Ulid::new());
        let b = BlueprintId::from_ulid(Ulid::new());
        assert_eq!(
            NotFoundError::Blueprints(vec![a, b]).to_string(),
            format!("Blueprints not found: [{a}, {b}]")
        );
    }

    #[test]
    fn validation_is_invalid_argument() {
        let err = BlueprintError::from(ValidationError::MissingProject);
        assert!(err.is_invalid_argument());
        assert!(!err.is_internal());
    }
}
