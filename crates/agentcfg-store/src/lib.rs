//! Agent Config Store
//!
//! Durable storage for blueprints, interval-stamped value rows and
//! environment bindings.
//!
//! # Core Concepts
//!
//! - [`StoreTx`]: storage primitives available inside one unit of work
//! - [`ConfigStore`]: runs a closure as one read or write unit of work
//! - [`MemoryStore`]: copy-on-write in-memory backend
//! - [`SqliteStore`]: `SQLite` backend
//!
//! # Example
//!
//! ```rust
//! use agentcfg_model::ProjectId;
//! use agentcfg_store::{ConfigStore, MemoryStore, StoreError, TxMode};
//!
//! let store = MemoryStore::new();
//! let config = store.in_transaction(TxMode::Read, |tx| {
//!     tx.get_config_by_project("workspace", ProjectId::new())
//! })?;
//! assert!(config.is_none());
//! # Ok::<(), StoreError>(())
//! ```

#![warn(unreachable_pub)]

mod contract;
mod error;
mod memory;
mod sqlite;

pub use contract::{ConfigStore, StoreTx, TxMode};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SqliteStoreConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
