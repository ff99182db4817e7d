//! Tracing subscriber setup

use crate::config::{ConfigError, LoggingSettings};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON when stdout is not a terminal, text otherwise
    #[default]
    Auto,
    /// One JSON object per event
    Json,
    /// Human-readable text
    Text,
}

impl LogFormat {
    /// Whether this format emits JSON in the current process
    #[must_use]
    pub fn use_json(self) -> bool {
        match self {
            Self::Json => true,
            Self::Text => false,
            Self::Auto => !std::io::stdout().is_terminal(),
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter.
///
/// # Errors
/// Returns `ConfigError::Logging` if the filter is malformed or a global
/// subscriber is already installed
pub fn init_logging(settings: &LoggingSettings) -> Result<(), ConfigError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|e| ConfigError::Logging(format!("invalid filter '{}': {e}", settings.filter)))?,
    };

    let result = if settings.format.use_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .try_init()
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}
