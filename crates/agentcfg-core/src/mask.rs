//! Mask overlays

use crate::error::{BlueprintError, NotFoundError};
use agentcfg_model::{BlueprintId, BlueprintType, ConfigValue, ProjectId};
use agentcfg_store::StoreTx;
use std::collections::HashMap;

/// Overlays a mask's delta onto a resolved value set
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskApplier;

impl MaskApplier {
    /// Create applier
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Overlay mask `mask_id` onto `resolved`
    ///
    /// # Errors
    /// Returns `NotFound` if `mask_id` is not a `MASK` of `project_id`
    pub fn apply_mask(
        &self,
        tx: &dyn StoreTx,
        workspace_id: &str,
        resolved: Vec<ConfigValue>,
        mask_id: BlueprintId,
        project_id: ProjectId,
    ) -> Result<Vec<ConfigValue>, BlueprintError> {
        tx.get_blueprint_by_id_and_type(workspace_id, mask_id, project_id, BlueprintType::Mask)?
            .ok_or(NotFoundError::Mask {
                mask_id,
                project_id,
            })?;

        let delta = tx.get_delta_values(workspace_id, mask_id)?;
        tracing::debug!("Applying {} mask values from '{}'", delta.len(), mask_id);
        Ok(overlay(resolved, delta))
    }
}

/// Replace or insert each mask entry by key
///
/// Entries are replaced whole; fields are never merged.
#[must_use]
pub fn overlay(base: Vec<ConfigValue>, mask: Vec<ConfigValue>) -> Vec<ConfigValue> {
    let mut by_key: HashMap<String, ConfigValue> =
        base.into_iter().map(|v| (v.key.clone(), v)).collect();
    for value in mask {
        by_key.insert(value.key.clone(), value);
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcfg_model::{ValueId, ValueType};
    use pretty_assertions::assert_eq;
    use ulid::Ulid;

    fn row(key: &str, value: &str, value_type: ValueType, description: Option<&str>) -> ConfigValue {
        ConfigValue {
            id: ValueId::from_ulid(Ulid::new()),
            project_id: ProjectId::new(),
            key: key.into(),
            value: value.into(),
            value_type,
            description: description.map(Into::into),
            valid_from: BlueprintId::from_ulid(Ulid::new()),
            valid_to: None,
        }
    }

    fn sorted(mut values: Vec<ConfigValue>) -> Vec<(String, String)> {
        values.sort_by(|a, b| a.key.cmp(&b.key));
        values.into_iter().map(|v| (v.key, v.value)).collect()
    }

    #[test]
    fn overlay_overrides_and_adds() {
        let base = vec![
            row("x", "3", ValueType::Integer, None),
            row("y", "2", ValueType::Integer, None),
        ];
        let mask = vec![
            row("x", "99", ValueType::Integer, None),
            row("z", "1", ValueType::Integer, None),
        ];

        assert_eq!(
            sorted(overlay(base, mask)),
            vec![
                ("x".to_string(), "99".to_string()),
                ("y".to_string(), "2".to_string()),
                ("z".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn overlay_replaces_whole_entry() {
        let base = vec![row("temp", "0.7", ValueType::Float, Some("sampling"))];
        let replacement = row("temp", "hot", ValueType::String, None);

        let result = overlay(base, vec![replacement.clone()]);
        assert_eq!(result, vec![replacement]);
    }

    #[test]
    fn empty_mask_is_identity() {
        let base = vec![row("a", "1", ValueType::String, None)];
        assert_eq!(overlay(base.clone(), Vec::new()), base);
    }
}
