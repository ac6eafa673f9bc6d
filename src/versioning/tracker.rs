//! Version tracker
//!
//! Compares each module's file-declared version manifest against the
//! durably recorded applied version and history, and applies or rolls
//! back the delta. Every operation is committed to history immediately
//! after it succeeds, so re-running the tracker is idempotent.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::registry::ModuleRegistry;
use crate::traits::{ModuleError, Notes, ScriptRunner};
use crate::versioning::manifest::{ManifestEntry, UpdateStep, VersionManifest};
use crate::versioning::store::VersionStore;
use crate::versioning::version::Version;

/// Per-module migration tracker
pub struct VersionTracker {
    store: Arc<VersionStore>,
    runner: Box<dyn ScriptRunner>,
}

impl VersionTracker {
    pub fn new(store: Arc<VersionStore>, runner: Box<dyn ScriptRunner>) -> Self {
        Self { store, runner }
    }

    pub fn store(&self) -> &Arc<VersionStore> {
        &self.store
    }

    /// Manifest entries strictly above the module's recorded applied
    /// version. Empty when the module has no manifest file.
    pub fn pending_versions(
        &self,
        registry: &ModuleRegistry,
        id: &str,
    ) -> Result<Vec<ManifestEntry>, ModuleError> {
        let (code, path) = self.locate(registry, id)?;
        let manifest = match VersionManifest::load(&path)? {
            Some(manifest) => manifest,
            None => return Ok(Vec::new()),
        };
        let applied = self.applied(&code)?;
        Ok(manifest.entries_after(applied.as_ref()).to_vec())
    }

    /// Apply all pending versions in ascending order.
    ///
    /// For each version: scripts not yet in history run through the
    /// `ScriptRunner` and are recorded; comments are recorded once per
    /// version; the applied version is overwritten after the version's
    /// operations complete. A script file missing on disk is noted and
    /// skipped so one broken migration does not block the run.
    ///
    /// Stops after applying `stop_at` when given. Returns false when the
    /// module has no manifest file.
    pub fn apply(
        &self,
        registry: &ModuleRegistry,
        id: &str,
        stop_at: Option<&Version>,
        notes: &mut Notes,
    ) -> Result<bool, ModuleError> {
        let (code, path) = self.locate(registry, id)?;
        let manifest = match VersionManifest::load(&path)? {
            Some(manifest) => manifest,
            None => return Ok(false),
        };

        let applied = self.applied(&code)?;
        let pending = manifest.entries_after(applied.as_ref());
        if pending.is_empty() {
            notes.note("- Nothing to update.");
            return Ok(true);
        }

        for entry in pending {
            self.apply_entry(&code, &path, entry, notes)?;

            if stop_at == Some(&entry.version) {
                break;
            }
        }

        Ok(true)
    }

    fn apply_entry(
        &self,
        code: &str,
        module_path: &std::path::Path,
        entry: &ManifestEntry,
        notes: &mut Notes,
    ) -> Result<(), ModuleError> {
        let version = entry.version.as_str();

        for step in &entry.steps {
            let script = match step {
                UpdateStep::Script(script) => script,
                UpdateStep::Comment(_) => continue,
            };
            if self.store.has_history(code, version, Some(script))? {
                continue;
            }

            let script_path = VersionManifest::script_path(module_path, script);
            if !script_path.is_file() {
                warn!("{} v{}: migration file {:?} not found", code, version, script);
                notes.note(format!(
                    "- v{}: migration file \"{}\" not found",
                    version, script
                ));
                continue;
            }

            self.runner.run_up(code, &script_path)?;
            self.store
                .record_history(code, version, UpdateStep::Script(script.clone()))?;
        }

        if !self.store.has_history(code, version, None)? {
            for step in &entry.steps {
                if let UpdateStep::Comment(comment) = step {
                    self.store
                        .record_history(code, version, UpdateStep::Comment(comment.clone()))?;
                    notes.note(format!("- v{}: {}", version, comment));
                }
            }
        }

        self.store.set_applied_version(code, Some(version))?;
        debug!("{}: applied version {}", code, version);
        Ok(())
    }

    /// Walk history in reverse chronological order, un-recording each
    /// entry and running script teardowns.
    ///
    /// With `stop_at`, the target version's own entries are also undone;
    /// the walk halts at the first entry of a different version, which
    /// becomes the new applied version. Without it, history is undone
    /// entirely and the applied version returns to the "never installed"
    /// sentinel. Returns false when the module has no manifest file.
    pub fn rollback(
        &self,
        registry: &ModuleRegistry,
        id: &str,
        stop_at: Option<&Version>,
        notes: &mut Notes,
    ) -> Result<bool, ModuleError> {
        let (code, path) = self.locate(registry, id)?;
        if VersionManifest::load(&path)?.is_none() {
            return Ok(false);
        }

        let mut history = self.store.history(&code)?;
        history.reverse();

        let stop_raw = stop_at.map(|version| version.to_string());
        let mut stop_seen = false;
        let mut new_version: Option<String> = None;

        for (seq, record) in history {
            if stop_seen && Some(&record.version) != stop_raw.as_ref() {
                // History holds multiple rows per version (comments and
                // scripts); the first row of a different version marks
                // where the rollback stops
                new_version = Some(record.version);
                break;
            }

            match &record.step {
                UpdateStep::Comment(_) => {}
                UpdateStep::Script(script) => {
                    let script_path = VersionManifest::script_path(&path, script);
                    if script_path.is_file() {
                        self.runner.run_down(&code, &script_path)?;
                    } else {
                        warn!(
                            "{} v{}: migration file {:?} missing during rollback",
                            code, record.version, script
                        );
                        notes.note(format!(
                            "- v{}: migration file \"{}\" not found",
                            record.version, script
                        ));
                    }
                }
            }
            self.store.remove_history(seq)?;

            if Some(&record.version) == stop_raw.as_ref() {
                stop_seen = true;
            }
        }

        self.store
            .set_applied_version(&code, new_version.as_deref())?;
        Ok(true)
    }

    /// Unconditionally delete all durable records for a module, used when
    /// its files no longer exist on disk. Returns whether anything was
    /// deleted.
    pub fn purge(&self, id: &str) -> Result<bool, ModuleError> {
        Ok(self.store.purge(id)?)
    }

    fn locate(
        &self,
        registry: &ModuleRegistry,
        id: &str,
    ) -> Result<(String, std::path::PathBuf), ModuleError> {
        let descriptor = registry
            .get(id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
        Ok((descriptor.identifier.clone(), descriptor.path.clone()))
    }

    fn applied(&self, code: &str) -> Result<Option<Version>, ModuleError> {
        match self.store.applied_version(code)? {
            // A versionless record only carries the disabled flag
            Some(record) if !record.version.is_empty() => Ok(Some(record.version.parse()?)),
            _ => Ok(None),
        }
    }
}
