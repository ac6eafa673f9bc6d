//! Module registry
//!
//! Owns the descriptors for every discovered module and the
//! identifier-to-path map. Identifier comparison is case-insensitive,
//! storage is case-preserving, and iteration follows discovery order.

pub mod definition;
pub mod discovery;

pub use definition::{ModuleDefinition, ModuleDescriptor};
pub use discovery::{DiscoveredModule, ModuleDiscovery, DEFINITION_FILE};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::traits::ModuleError;

/// Registry of discovered modules
#[derive(Debug)]
pub struct ModuleRegistry {
    modules_dir: PathBuf,
    /// Descriptors keyed by lowercase identifier
    descriptors: HashMap<String, ModuleDescriptor>,
    /// Canonical identifiers in discovery order
    order: Vec<String>,
}

impl ModuleRegistry {
    /// Discover all modules under `modules_dir` and build the registry
    pub fn discover<P: AsRef<Path>>(modules_dir: P) -> Result<Self, ModuleError> {
        let mut registry = Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            descriptors: HashMap::new(),
            order: Vec::new(),
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Rebuild all descriptors wholesale from the filesystem
    pub fn reload(&mut self) -> Result<(), ModuleError> {
        self.descriptors.clear();
        self.order.clear();

        let discovered = ModuleDiscovery::new(&self.modules_dir).discover()?;
        for module in discovered {
            let key = module.identifier.to_lowercase();
            if self.descriptors.contains_key(&key) {
                // Same identifier with different casing; first discovery wins
                tracing::warn!("Duplicate module identifier {}, skipping", module.identifier);
                continue;
            }
            let descriptor = ModuleDescriptor::new(
                module.identifier.clone(),
                module.directory,
                module.definition,
            );
            self.descriptors.insert(key, descriptor);
            self.order.push(module.identifier);
        }

        Ok(())
    }

    /// Resolve an identifier case-insensitively to its canonical form
    pub fn canonical(&self, id: &str) -> Option<&str> {
        self.descriptors
            .get(&id.to_lowercase())
            .map(|descriptor| descriptor.identifier.as_str())
    }

    /// Look up a descriptor by identifier (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.get(&id.to_lowercase())
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ModuleDescriptor> {
        self.descriptors.get_mut(&id.to_lowercase())
    }

    /// Filesystem location of a module's root directory
    pub fn get_path(&self, id: &str) -> Option<&Path> {
        self.get(id).map(|descriptor| descriptor.path.as_path())
    }

    /// Registered AND not disabled
    pub fn exists(&self, id: &str) -> bool {
        self.get(id).map(|d| !d.disabled).unwrap_or(false)
    }

    /// Whether the identifier is registered, regardless of enablement
    pub fn is_registered(&self, id: &str) -> bool {
        self.descriptors.contains_key(&id.to_lowercase())
    }

    /// Canonical identifiers in discovery order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// All descriptors in discovery order
    pub fn descriptors(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.descriptors.get(&id.to_lowercase()))
    }

    /// Descriptors that are currently enabled, in discovery order
    pub fn enabled(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.descriptors().filter(|descriptor| !descriptor.disabled)
    }

    /// Mirror an enablement state change onto the descriptor
    pub fn mark_disabled(&mut self, id: &str, disabled: bool) {
        if let Some(descriptor) = self.get_mut(id) {
            descriptor.disabled = disabled;
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
