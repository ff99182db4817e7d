//! Service configuration
//!
//! Loaded from TOML; every field has a default, so an empty file is valid.
//!
//! ```toml
//! [environments]
//! mask_binding = "reject"
//!
//! [logging]
//! format = "auto"
//! filter = "info,agentcfg_core=debug"
//!
//! [store]
//! path = "agentcfg.db"
//! busy_timeout_ms = 5000
//! ```

use crate::environment::MaskBindingPolicy;
use crate::logging::LogFormat;
use agentcfg_store::SqliteStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration loading and setup errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML or has wrongly typed fields
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub environments: EnvironmentSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
}

impl ServiceConfig {
    /// Read configuration from a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed input
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// `[environments]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub mask_binding: MaskBindingPolicy,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// Fallback directive when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Auto,
            filter: "info".to_string(),
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("agentcfg.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreSettings {
    /// SQLite settings for [`agentcfg_store::SqliteStore::open`]
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig::new(&self.path).with_busy_timeout_ms(self.busy_timeout_ms)
    }
}
