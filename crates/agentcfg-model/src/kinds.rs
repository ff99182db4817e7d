//! Closed discriminator enums
//!
//! Both enums are stored and transmitted as lowercase strings. Parsing an
//! unknown string fails with [`UnknownDiscriminator`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rejected discriminator string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownDiscriminator {
    /// Which discriminator was being parsed
    pub kind: &'static str,
    /// The rejected string
    pub value: String,
}

/// Blueprint record discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintType {
    /// One step in the project's configuration history
    Blueprint,
    /// Reusable overlay, never part of the history
    Mask,
}

impl BlueprintType {
    /// Stored string form
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blueprint => "blueprint",
            Self::Mask => "mask",
        }
    }
}

impl fmt::Display for BlueprintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlueprintType {
    type Err = UnknownDiscriminator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blueprint" => Ok(Self::Blueprint),
            "mask" => Ok(Self::Mask),
            other => Err(UnknownDiscriminator {
                kind: "blueprint type",
                value: other.to_string(),
            }),
        }
    }
}

/// Declared type of a config value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Free text
    String,
    /// Integer number
    Integer,
    /// Floating point number
    Float,
    /// `true` / `false`
    Boolean,
    /// Prompt reference
    Prompt,
    /// Pinned prompt commit
    PromptCommit,
}

impl ValueType {
    /// All value types, in declaration order
    pub const ALL: [ValueType; 6] = [
        Self::String,
        Self::Integer,
        Self::Float,
        Self::Boolean,
        Self::Prompt,
        Self::PromptCommit,
    ];

    /// Stored string form
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Prompt => "prompt",
            Self::PromptCommit => "prompt_commit",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = UnknownDiscriminator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownDiscriminator {
                kind: "value type",
                value: s.to_string(),
            })
    }
}
