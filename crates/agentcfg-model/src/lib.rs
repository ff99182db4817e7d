//! Agent Config Model
//!
//! Domain records and request types for versioned agent configuration
//! blueprints.
//!
//! # Core Concepts
//!
//! - [`Blueprint`]: immutable, ordered configuration version (or mask overlay)
//! - [`ConfigValue`]: one key/value row with a `[valid_from, valid_to)` interval
//! - [`EnvironmentBinding`]: named pointer to a blueprint version
//! - [`CreateConfigRequest`] / [`EnvUpdateRequest`]: validated write requests
//!
//! # Example
//!
//! ```rust
//! use agentcfg_model::{BlueprintDraft, CreateConfigRequest, NewValue, ValueType};
//!
//! let draft = BlueprintDraft::blueprint(vec![
//!     NewValue::new("model", "gpt-4", ValueType::String),
//!     NewValue::new("temperature", "0.7", ValueType::Float),
//! ])
//! .with_description("Initial configuration");
//!
//! let request = CreateConfigRequest::for_project_name("my-agent", draft);
//! assert!(request.validate().is_ok());
//! ```

#![warn(unreachable_pub)]

mod ids;
mod kinds;
mod records;
mod request;
pub mod validation;

pub use ids::{BlueprintId, ConfigId, EnvId, IdParseError, ProjectId, ValueId};
pub use kinds::{BlueprintType, UnknownDiscriminator, ValueType};
pub use records::{AgentConfig, Blueprint, BlueprintPage, ConfigValue, EnvironmentBinding, Project};
pub use request::{
    BlueprintDraft, CreateConfigRequest, EnvBinding, EnvUpdateRequest, NewValue, PageRequest,
    ProjectRef, RequestIdentity,
};
pub use validation::ValidationError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
