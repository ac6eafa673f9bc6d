//! Module definition parsing and validation
//!
//! Handles parsing `module.toml` definition files and validating the
//! declared metadata.

use crate::traits::ModuleError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Module definition (`module.toml` structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Human-readable module name
    #[serde(default)]
    pub name: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Module author
    #[serde(default)]
    pub author: Option<String>,
    /// Identifiers of modules this module depends on (`Vendor.Module`)
    #[serde(default)]
    pub requires: Vec<String>,
    /// Elevated modules run their hooks even under the no-init flag
    #[serde(default)]
    pub elevated: bool,
}

impl ModuleDefinition {
    /// Load a definition from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModuleError::InvalidDefinition(format!(
                "failed to read definition file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let definition: ModuleDefinition = toml::from_str(&contents).map_err(|e| {
            ModuleError::InvalidDefinition(format!(
                "failed to parse definition file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        for require in &definition.requires {
            if !is_valid_identifier(require) {
                return Err(ModuleError::InvalidDefinition(format!(
                    "invalid dependency identifier {:?} in {:?}",
                    require,
                    path.as_ref()
                )));
            }
        }

        Ok(definition)
    }
}

/// Checks a `Vendor.Module` identifier: exactly two non-empty dot-separated
/// segments of alphanumerics, underscores or hyphens.
pub fn is_valid_identifier(id: &str) -> bool {
    let mut segments = id.split('.');
    let (vendor, module) = match (segments.next(), segments.next(), segments.next()) {
        (Some(v), Some(m), None) => (v, m),
        _ => return false,
    };
    let segment_ok = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    };
    segment_ok(vendor) && segment_ok(module)
}

/// Descriptor for a discovered module
///
/// Created once per discovered module directory during registry load.
/// Only the `disabled` flag is mutated afterwards; a full reload rebuilds
/// descriptors wholesale.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    /// Canonical identifier, `Vendor.Module` (case-preserving)
    pub identifier: String,
    /// Absolute path of the module's root directory
    pub path: PathBuf,
    /// Transient mirror of the enablement store state at load time
    pub disabled: bool,
    /// Allowed to run hooks under the no-init flag
    pub elevated: bool,
    /// Identifiers this module depends on, in declared order
    pub requires: Vec<String>,
    /// Human-readable description from the definition
    pub description: Option<String>,
    /// Module author from the definition
    pub author: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(identifier: String, path: PathBuf, definition: ModuleDefinition) -> Self {
        Self {
            identifier,
            path,
            disabled: false,
            elevated: definition.elevated,
            requires: definition.requires,
            description: definition.description,
            author: definition.author,
        }
    }
}
