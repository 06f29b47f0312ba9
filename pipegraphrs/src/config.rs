//! Configuration system for pipegraph.
//!
//! Supports TOML-based configuration with global defaults and per-schema overrides.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipegraphError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipegraphConfig {
    /// Global defaults applied to all schemas unless overridden.
    pub defaults: GlobalDefaults,

    /// Per-schema configuration overrides (keyed by schema name).
    #[serde(default)]
    pub schemas: HashMap<String, SchemaConfig>,
}

/// Global default settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalDefaults {
    pub database: DatabaseConfig,
    pub validation: ValidationConfig,
}

/// Database naming configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Prepended to every schema name to form its database name (default: empty).
    pub prefix: String,
}

/// Validation configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Log lint failures instead of rejecting the registry (default: false).
    pub warn_only: bool,
}

/// Per-schema configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Database name used verbatim instead of `prefix + schema`.
    pub database: Option<String>,
}

impl PipegraphConfig {
    /// Configuration with only a database prefix set.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let mut cfg = Self::default();
        cfg.defaults.database.prefix = prefix.into();
        cfg
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PipegraphError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| PipegraphError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `PIPEGRAPH_CONFIG` environment variable
    /// 2. `./pipegraph.toml` (current directory)
    /// 3. `~/.config/pipegraph/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("PIPEGRAPH_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from PIPEGRAPH_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring PIPEGRAPH_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("pipegraph.toml") {
            tracing::info!("loaded config from ./pipegraph.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("pipegraph").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Database name for a schema: per-schema override, else prefix + name.
    pub fn database_for(&self, schema: &str) -> String {
        match self.schemas.get(schema).and_then(|s| s.database.clone()) {
            Some(database) => database,
            None => format!("{}{}", self.defaults.database.prefix, schema),
        }
    }
}
