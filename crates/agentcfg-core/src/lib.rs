//! Agent Config Core - versioned agent configuration blueprints
//!
//! The engine that:
//! - Appends immutable blueprint versions and maintains value intervals
//! - Reconstructs the effective value set at any point in history
//! - Overlays masks onto resolved values without touching the timeline
//! - Pins named environments to blueprint versions
//!
//! # Core Concepts
//!
//! - [`AgentConfigService`]: one entry point per operation, one unit of work per call
//! - [`VersioningEngine`]: close-then-insert writes
//! - [`Resolver`]: point-in-time, environment, delta and history reads
//! - [`MaskApplier`]: key-wise overlay of a mask's delta
//! - [`EnvironmentBinder`]: validated environment pins
//!
//! # Example
//!
//! ```rust
//! use agentcfg_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), BlueprintError> {
//! let service = AgentConfigService::new(
//!     MemoryStore::new(),
//!     Arc::new(InMemoryProjectDirectory::new()),
//! );
//! let identity = RequestIdentity::new("workspace", "alice");
//!
//! let draft = BlueprintDraft::blueprint(vec![NewValue::new("model", "gpt-4", ValueType::String)]);
//! let created = service
//!     .create_or_update_config(&identity, &CreateConfigRequest::for_project_name("bot", draft))
//!     .await?;
//!
//! let latest = service.get_latest_blueprint(&identity, created.project_id, None)?;
//! assert_eq!(latest.id, created.id);
//! # Ok(())
//! # }
//! # futures::executor::block_on(example()).unwrap();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
mod directory;
mod environment;
mod error;
mod ids;
pub mod logging;
mod mask;
mod resolver;
mod service;
mod versioning;

// Re-exports for convenience
pub use config::{ConfigError, ServiceConfig};
pub use directory::{InMemoryProjectDirectory, ProjectDirectory, ProjectError};
pub use environment::{EnvironmentBinder, MaskBindingPolicy};
pub use error::{BlueprintError, NotFoundError};
pub use ids::{IdGenerator, MonotonicUlidGenerator};
pub use logging::{init_logging, LogFormat};
pub use mask::{overlay, MaskApplier};
pub use resolver::Resolver;
pub use service::AgentConfigService;
pub use versioning::{VersioningEngine, MAX_ID_CLOCK_SKEW_MS};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with agent configs
    pub use crate::{
        AgentConfigService, BlueprintError, InMemoryProjectDirectory, MaskBindingPolicy,
        NotFoundError, ProjectDirectory,
    };
    pub use agentcfg_model::{
        Blueprint, BlueprintDraft, BlueprintId, BlueprintType, CreateConfigRequest, EnvBinding,
        EnvUpdateRequest, NewValue, ProjectId, RequestIdentity, ValueType,
    };
    pub use agentcfg_store::{ConfigStore, MemoryStore, SqliteStore};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
