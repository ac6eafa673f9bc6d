//! Module discovery
//!
//! Scans the two-level `<Vendor>/<Module>` directory tree and discovers
//! installable modules.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::registry::definition::ModuleDefinition;
use crate::traits::ModuleError;

/// Definition file marking a directory pair as a module,
/// matched case-insensitively
pub const DEFINITION_FILE: &str = "module.toml";

/// Discovered module information
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Canonical identifier built from the directory names
    pub identifier: String,
    /// Module root directory
    pub directory: PathBuf,
    /// Parsed definition
    pub definition: ModuleDefinition,
}

/// Module discovery scanner
pub struct ModuleDiscovery {
    /// Base directory scanned for `<Vendor>/<Module>` pairs
    modules_dir: PathBuf,
}

impl ModuleDiscovery {
    /// Create a new module discovery scanner
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
        }
    }

    /// Discover all modules under the modules directory
    ///
    /// A directory pair is a module iff it contains a case-insensitively
    /// matched definition file at depth 2. A malformed definition skips
    /// that module only; the rest of the scan continues. Directory entries
    /// are visited in name order so discovery order is deterministic.
    pub fn discover(&self) -> Result<Vec<DiscoveredModule>, ModuleError> {
        info!("Discovering modules in {:?}", self.modules_dir);

        if !self.modules_dir.is_dir() {
            debug!(
                "Modules directory {:?} does not exist, nothing to discover",
                self.modules_dir
            );
            return Ok(Vec::new());
        }

        let mut modules = Vec::new();

        for vendor_dir in sorted_subdirs(&self.modules_dir)? {
            let vendor_name = match dir_name(&vendor_dir) {
                Some(name) => name,
                None => continue,
            };

            for module_dir in sorted_subdirs(&vendor_dir)? {
                let module_name = match dir_name(&module_dir) {
                    Some(name) => name,
                    None => continue,
                };

                let definition_path = match find_definition_file(&module_dir)? {
                    Some(path) => path,
                    None => {
                        debug!("No definition file in {:?}, skipping", module_dir);
                        continue;
                    }
                };

                let identifier = format!("{}.{}", vendor_name, module_name);

                // Partial-failure isolation: one broken module must never
                // abort the whole scan
                match ModuleDefinition::from_file(&definition_path) {
                    Ok(definition) => {
                        debug!("Discovered module {}", identifier);
                        modules.push(DiscoveredModule {
                            identifier,
                            directory: module_dir,
                            definition,
                        });
                    }
                    Err(e) => {
                        error!("Module {} could not be loaded: {}", identifier, e);
                    }
                }
            }
        }

        info!("Discovered {} modules", modules.len());
        Ok(modules)
    }
}

/// Subdirectories of `dir`, sorted by name
fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, ModuleError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ModuleError::Persistence(format!("failed to read directory {:?}: {}", dir, e))
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ModuleError::Persistence(format!("failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
}

/// Case-insensitive lookup of the definition file within a module directory
fn find_definition_file(module_dir: &Path) -> Result<Option<PathBuf>, ModuleError> {
    let entries = fs::read_dir(module_dir).map_err(|e| {
        ModuleError::Persistence(format!("failed to read directory {:?}: {}", module_dir, e))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            ModuleError::Persistence(format!("failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.eq_ignore_ascii_case(DEFINITION_FILE))
            .unwrap_or(false);
        if matches {
            return Ok(Some(path));
        }
    }

    Ok(None)
}
