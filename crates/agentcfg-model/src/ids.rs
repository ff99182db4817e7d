//! Identifier newtypes
//!
//! Every identifier minted by this system is a [`Ulid`], so ordering an id
//! orders by creation time. Projects come from an external directory and use
//! [`Uuid`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;
use uuid::Uuid;

/// Failure to parse an identifier from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}': {reason}")]
pub struct IdParseError {
    /// Identifier kind being parsed
    pub kind: &'static str,
    /// Rejected input
    pub value: String,
    /// Decoder message
    pub reason: String,
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Wrap an existing ULID
            #[inline]
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Underlying ULID
            #[inline]
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self).map_err(|e| IdParseError {
                    kind: $kind,
                    value: s.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    };
}

ulid_id!(
    /// Blueprint (or mask) identifier. Later blueprints compare greater.
    BlueprintId,
    "blueprint id"
);

ulid_id!(
    /// Config value row identifier
    ValueId,
    "value id"
);

ulid_id!(
    /// Environment binding identifier
    EnvId,
    "environment id"
);

ulid_id!(
    /// Per-project config identifier
    ConfigId,
    "config id"
);

/// Project identifier, owned by the project directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    /// Generate a random project ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|e| IdParseError {
            kind: "project id",
            value: s.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blueprint_id_roundtrips_through_text() {
        let id = BlueprintId::from_ulid(Ulid::new());
        let parsed: BlueprintId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn blueprint_id_rejects_garbage() {
        let err = "not-a-ulid".parse::<BlueprintId>().unwrap_err();
        assert_eq!(err.kind, "blueprint id");
        assert!(err.to_string().contains("not-a-ulid"));
    }

    #[test]
    fn ulid_text_order_matches_id_order() {
        let mut generator = ulid::Generator::new();
        let a = BlueprintId::from_ulid(generator.generate().unwrap());
        let b = BlueprintId::from_ulid(generator.generate().unwrap());

        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn project_id_parses_uuid() {
        let id = ProjectId::new();
        let parsed: ProjectId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("123".parse::<ProjectId>().is_err());
    }
}
