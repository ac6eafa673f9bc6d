//! Configuration for the module host
//!
//! Handles configuration loading and defaults for module discovery,
//! durable storage and enablement state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Root directory scanned for `<Vendor>/<Module>` pairs
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Directory for the durable store
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Fast-path cache file holding the disabled-module set
    #[serde(default = "default_disabled_cache_file")]
    pub disabled_cache_file: String,

    /// Modules disabled by configuration. Always disabled, merged at load
    /// and never persisted back to the cache file.
    #[serde(default)]
    pub disabled_modules: Vec<String>,

    /// Built-in modules, migrated before plugins and seeded on first run.
    /// Listed order is preserved.
    #[serde(default)]
    pub built_in_modules: Vec<String>,

    /// Suppress register/boot hooks for non-elevated modules.
    /// Migration application is never suppressed.
    #[serde(default)]
    pub no_init: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "modhost=debug")
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_modules_dir() -> String {
    "modules".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_disabled_cache_file() -> String {
    "data/disabled.json".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            data_dir: default_data_dir(),
            disabled_cache_file: default_disabled_cache_file(),
            disabled_modules: Vec::new(),
            built_in_modules: Vec::new(),
            no_init: false,
            log_filter: None,
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {:?}", path.as_ref()))?;
        Ok(config)
    }

    pub fn modules_dir(&self) -> PathBuf {
        PathBuf::from(&self.modules_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn disabled_cache_file(&self) -> PathBuf {
        PathBuf::from(&self.disabled_cache_file)
    }
}
