//! Enablement store
//!
//! Persists the disabled-module set across a fast-path cache file, with
//! one-time bootstrap from the durable store. Distinguishes user-initiated
//! from system-initiated disablement so dependency cascades never override
//! an administrator's explicit choice.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::traits::ModuleError;

/// Version tag of the cache file format
pub const CACHE_FORMAT: u32 = 1;

/// Who disabled a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    /// Disabled explicitly by the user; the system cannot re-enable it
    User,
    /// Disabled by the system (dependency cascade or bootstrap)
    System,
}

/// On-disk cache file structure
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    format: u32,
    disabled: BTreeMap<String, DisableReason>,
}

/// Store of module enablement state
///
/// Presence in the disabled set means "not currently active"; absence
/// means "active". Config-declared entries are merged at load and never
/// persisted back.
#[derive(Debug)]
pub struct EnablementStore {
    cache_path: PathBuf,
    /// Declared in configuration; re-derived each process start
    config_disabled: HashSet<String>,
    /// Persisted to the cache file
    disabled: BTreeMap<String, DisableReason>,
}

impl EnablementStore {
    /// Load the store following the startup sequence: merge the
    /// config-declared disabled list, then the cache file if present,
    /// otherwise bootstrap from the durable store and write the cache.
    ///
    /// `bootstrap` supplies the identifiers flagged disabled in durable
    /// storage; it is only invoked when the cache file is absent.
    pub fn load<F>(
        cache_path: PathBuf,
        config_disabled: &[String],
        bootstrap: F,
    ) -> Result<Self, ModuleError>
    where
        F: FnOnce() -> Result<Vec<String>, ModuleError>,
    {
        let mut store = Self {
            cache_path,
            config_disabled: config_disabled.iter().cloned().collect(),
            disabled: BTreeMap::new(),
        };

        if store.cache_path.is_file() {
            // Cache read/parse failure fails open to "nothing disabled"
            // for the cache layer only; config-declared disables still apply
            match store.read_cache() {
                Ok(disabled) => store.disabled = disabled,
                Err(e) => warn!(
                    "Failed to read enablement cache {:?}, treating as empty: {}",
                    store.cache_path, e
                ),
            }
        } else {
            for code in bootstrap()? {
                store.disabled.insert(code, DisableReason::System);
            }
            store.write_cache()?;
            debug!(
                "Bootstrapped enablement cache {:?} with {} disabled modules",
                store.cache_path,
                store.disabled.len()
            );
        }

        Ok(store)
    }

    /// True if the identifier is present in the merged disabled set.
    /// Matching is case-insensitive against known entries, verbatim otherwise.
    pub fn is_disabled(&self, id: &str) -> bool {
        self.find_config_entry(id).is_some() || self.find_entry(id).is_some()
    }

    /// Record a module as disabled and persist the cache file.
    /// Returns false (no-op) if the module is already disabled.
    pub fn disable(&mut self, id: &str, by_user: bool) -> Result<bool, ModuleError> {
        if self.is_disabled(id) {
            return Ok(false);
        }

        let reason = if by_user {
            DisableReason::User
        } else {
            DisableReason::System
        };
        self.disabled.insert(id.to_string(), reason);
        self.write_cache()?;
        Ok(true)
    }

    /// Remove a module's disabled record and persist the cache file.
    ///
    /// Returns false if the module is not disabled, if it is disabled by
    /// configuration, or if it was disabled by the user and the caller is
    /// not the user.
    pub fn enable(&mut self, id: &str, by_user: bool) -> Result<bool, ModuleError> {
        if self.find_config_entry(id).is_some() {
            return Ok(false);
        }

        let key = match self.find_entry(id) {
            Some(key) => key.to_string(),
            None => return Ok(false),
        };

        // Prevent the system from enabling modules disabled by the user
        if !by_user && self.disabled.get(&key) == Some(&DisableReason::User) {
            return Ok(false);
        }

        self.disabled.remove(&key);
        self.write_cache()?;
        Ok(true)
    }

    /// Delete the cache file and reset in-memory state, forcing
    /// re-derivation from the durable store on next load.
    pub fn clear(&mut self) -> Result<(), ModuleError> {
        if self.cache_path.is_file() {
            std::fs::remove_file(&self.cache_path).map_err(|e| {
                ModuleError::Persistence(format!(
                    "failed to delete enablement cache {:?}: {}",
                    self.cache_path, e
                ))
            })?;
        }
        self.disabled.clear();
        self.config_disabled.clear();
        Ok(())
    }

    /// Identifiers currently disabled, with their reasons
    pub fn disabled_entries(&self) -> impl Iterator<Item = (&str, DisableReason)> {
        self.config_disabled
            .iter()
            .map(|id| (id.as_str(), DisableReason::System))
            .chain(
                self.disabled
                    .iter()
                    .map(|(id, reason)| (id.as_str(), *reason)),
            )
    }

    fn find_entry(&self, id: &str) -> Option<&str> {
        self.disabled
            .keys()
            .find(|key| key.eq_ignore_ascii_case(id))
            .map(String::as_str)
    }

    fn find_config_entry(&self, id: &str) -> Option<&str> {
        self.config_disabled
            .iter()
            .find(|key| key.eq_ignore_ascii_case(id))
            .map(String::as_str)
    }

    fn read_cache(&self) -> Result<BTreeMap<String, DisableReason>, ModuleError> {
        let contents = std::fs::read_to_string(&self.cache_path)
            .map_err(|e| ModuleError::Persistence(format!("cache read failed: {}", e)))?;
        let cache: CacheFile = serde_json::from_str(&contents)
            .map_err(|e| ModuleError::Persistence(format!("cache parse failed: {}", e)))?;
        if cache.format != CACHE_FORMAT {
            return Err(ModuleError::Persistence(format!(
                "unsupported cache format {}",
                cache.format
            )));
        }
        Ok(cache.disabled)
    }

    fn write_cache(&self) -> Result<(), ModuleError> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ModuleError::Persistence(format!(
                    "failed to create cache directory {:?}: {}",
                    parent, e
                ))
            })?;
        }
        let cache = CacheFile {
            format: CACHE_FORMAT,
            disabled: self.disabled.clone(),
        };
        let contents = serde_json::to_string_pretty(&cache)
            .map_err(|e| ModuleError::Persistence(format!("cache encode failed: {}", e)))?;
        std::fs::write(&self.cache_path, contents).map_err(|e| {
            ModuleError::Persistence(format!(
                "failed to write enablement cache {:?}: {}",
                self.cache_path, e
            ))
        })
    }

    /// Path of the backing cache file
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }
}
