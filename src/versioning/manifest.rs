//! Version manifest parsing
//!
//! A module declares its migration history in `updates/version.toml`:
//! a mapping of version string to a list of operations, each either a
//! free-text comment or a migration script filename.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::traits::ModuleError;
use crate::versioning::version::Version;

/// Manifest location relative to the module root
pub const MANIFEST_FILE: &str = "updates/version.toml";

/// Recognized executable-script extensions
pub const SCRIPT_EXTENSIONS: &[&str] = &["sql", "sh"];

/// A single operation within a manifest version
///
/// Comments are narrative markers recorded for traceability; scripts are
/// executable migration units referenced by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStep {
    Comment(String),
    Script(String),
}

impl UpdateStep {
    /// Classify a raw manifest string: a well-formed filename with a
    /// recognized script extension is a script, anything else a comment.
    pub fn classify(raw: String) -> Self {
        if is_script_reference(&raw) {
            UpdateStep::Script(raw)
        } else {
            UpdateStep::Comment(raw)
        }
    }
}

fn is_script_reference(raw: &str) -> bool {
    let well_formed = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
    if !well_formed {
        return false;
    }
    let lower = raw.to_ascii_lowercase();
    SCRIPT_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)) && lower.len() > ext.len() + 1)
}

/// One manifest version with its ordered operations
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub version: Version,
    pub steps: Vec<UpdateStep>,
}

/// Raw manifest value: a single comment string or a list of operations
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSteps {
    One(String),
    Many(Vec<String>),
}

/// Parsed version manifest, entries sorted ascending by version
#[derive(Debug, Clone)]
pub struct VersionManifest {
    entries: Vec<ManifestEntry>,
}

impl VersionManifest {
    /// Load a module's manifest. Returns `Ok(None)` when the module has
    /// no manifest file.
    pub fn load(module_path: &Path) -> Result<Option<Self>, ModuleError> {
        let manifest_path = module_path.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&manifest_path).map_err(|e| {
            ModuleError::Persistence(format!(
                "failed to read manifest {:?}: {}",
                manifest_path, e
            ))
        })?;

        Self::parse(&contents)
            .map(Some)
            .map_err(|e| match e {
                ModuleError::InvalidVersion(v) => ModuleError::InvalidVersion(format!(
                    "{} (in manifest {:?})",
                    v, manifest_path
                )),
                other => other,
            })
    }

    /// Parse manifest contents
    pub fn parse(contents: &str) -> Result<Self, ModuleError> {
        let raw: HashMap<String, RawSteps> = toml::from_str(contents)
            .map_err(|e| ModuleError::InvalidDefinition(format!("malformed manifest: {}", e)))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (version, steps) in raw {
            let version: Version = version.parse()?;
            let steps = match steps {
                RawSteps::One(step) => vec![UpdateStep::classify(step)],
                RawSteps::Many(steps) => steps.into_iter().map(UpdateStep::classify).collect(),
            };
            entries.push(ManifestEntry { version, steps });
        }

        entries.sort_by(|a, b| a.version.cmp(&b.version));

        // Version strings must be unique within one manifest; numeric
        // duplicates under different spellings are rejected too
        for window in entries.windows(2) {
            if window[0].version == window[1].version {
                return Err(ModuleError::InvalidVersion(format!(
                    "duplicate manifest version {}",
                    window[1].version
                )));
            }
        }

        Ok(Self { entries })
    }

    /// All entries, ascending by version
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// The highest declared version
    pub fn latest(&self) -> Option<&Version> {
        self.entries.last().map(|entry| &entry.version)
    }

    /// Entries strictly greater than `after` (all entries when `None`)
    pub fn entries_after(&self, after: Option<&Version>) -> &[ManifestEntry] {
        match after {
            None => &self.entries,
            Some(after) => {
                let start = self
                    .entries
                    .partition_point(|entry| entry.version <= *after);
                &self.entries[start..]
            }
        }
    }

    /// Absolute path of a script referenced by this module's manifest
    pub fn script_path(module_path: &Path, script: &str) -> PathBuf {
        module_path.join("updates").join(script)
    }
}
