//! Durable version and history records
//!
//! One tree holds the single applied version per module, one append-only
//! tree holds the migration history, and a meta tree carries the
//! bootstrap flag and counters. History keys are big-endian sequence
//! numbers, so ascending key order is chronological order.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::{Database, Tree};
use crate::utils::time::current_timestamp;
use crate::versioning::manifest::UpdateStep;

const VERSIONS_TREE: &str = "module_versions";
const HISTORY_TREE: &str = "module_history";
const META_TREE: &str = "meta";

const META_BOOTSTRAPPED: &[u8] = b"bootstrapped";
const META_NEXT_SEQ: &[u8] = b"next_seq";
const META_UPDATE_COUNT: &[u8] = b"update_count";

/// The single applied version recorded per module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Module identifier, case-preserving
    pub code: String,
    /// Highest version considered installed
    pub version: String,
    /// Mirrored enablement flag, the bootstrap source for the
    /// enablement cache
    pub is_disabled: bool,
    /// Unix seconds
    pub created_at: u64,
}

/// One applied migration operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Module identifier, case-preserving
    pub code: String,
    /// Version the operation belongs to
    pub version: String,
    /// The operation itself (comment text or script filename)
    pub step: UpdateStep,
    /// Unix seconds
    pub applied_at: u64,
}

/// Durable store for applied versions and migration history
pub struct VersionStore {
    db: Arc<dyn Database>,
    versions: Arc<dyn Tree>,
    history: Arc<dyn Tree>,
    meta: Arc<dyn Tree>,
}

impl VersionStore {
    pub fn new(db: Arc<dyn Database>) -> Result<Self> {
        let versions = Arc::from(db.open_tree(VERSIONS_TREE)?);
        let history = Arc::from(db.open_tree(HISTORY_TREE)?);
        let meta = Arc::from(db.open_tree(META_TREE)?);
        Ok(Self {
            db,
            versions,
            history,
            meta,
        })
    }

    //
    // Bootstrap
    //

    /// Whether the migration store has been initialized
    pub fn is_bootstrapped(&self) -> Result<bool> {
        self.meta.contains_key(META_BOOTSTRAPPED)
    }

    /// Mark the store initialized (first `update()` run)
    pub fn bootstrap(&self) -> Result<()> {
        self.meta.insert(META_BOOTSTRAPPED, &[1])?;
        self.db.flush()
    }

    /// Drop all version, history and meta records (full uninstall)
    pub fn drop_all(&self) -> Result<()> {
        self.versions.clear()?;
        self.history.clear()?;
        self.meta.clear()?;
        self.db.flush()
    }

    //
    // Applied versions
    //

    pub fn applied_version(&self, code: &str) -> Result<Option<VersionRecord>> {
        match self.versions.get(version_key(code).as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the applied version, or delete the record entirely when
    /// `version` is `None` (the "never installed" sentinel)
    pub fn set_applied_version(&self, code: &str, version: Option<&str>) -> Result<()> {
        let key = version_key(code);
        match version {
            Some(version) => {
                let is_disabled = self
                    .applied_version(code)?
                    .map(|record| record.is_disabled)
                    .unwrap_or(false);
                let record = VersionRecord {
                    code: code.to_string(),
                    version: version.to_string(),
                    is_disabled,
                    created_at: current_timestamp(),
                };
                self.versions
                    .insert(key.as_bytes(), &bincode::serialize(&record)?)?;
            }
            None => self.versions.remove(key.as_bytes())?,
        }
        Ok(())
    }

    /// Persist the disabled flag on a module's version record, creating
    /// a versionless record if the module was never installed
    pub fn set_disabled_flag(&self, code: &str, disabled: bool) -> Result<()> {
        let key = version_key(code);
        let mut record = match self.applied_version(code)? {
            Some(record) => record,
            None if !disabled => return Ok(()),
            None => VersionRecord {
                code: code.to_string(),
                version: String::new(),
                is_disabled: false,
                created_at: current_timestamp(),
            },
        };
        record.is_disabled = disabled;
        self.versions
            .insert(key.as_bytes(), &bincode::serialize(&record)?)?;
        Ok(())
    }

    /// Identifiers flagged disabled in durable storage, used for the
    /// one-time enablement cache bootstrap
    pub fn disabled_codes(&self) -> Result<Vec<String>> {
        let mut codes = Vec::new();
        for item in self.versions.iter() {
            let (_, data) = item?;
            let record: VersionRecord = bincode::deserialize(&data)?;
            if record.is_disabled {
                codes.push(record.code);
            }
        }
        Ok(codes)
    }

    //
    // History
    //

    /// Full history for a module in chronological order, with the
    /// sequence key of each row
    pub fn history(&self, code: &str) -> Result<Vec<(u64, HistoryRecord)>> {
        let code_key = version_key(code);
        let mut rows = Vec::new();
        for item in self.history.iter() {
            let (key, data) = item?;
            let record: HistoryRecord = bincode::deserialize(&data)?;
            if version_key(&record.code) == code_key {
                rows.push((decode_seq(&key)?, record));
            }
        }
        Ok(rows)
    }

    /// Whether a history row exists for (module, version, script), or for
    /// any comment of that version when `script` is `None`
    pub fn has_history(&self, code: &str, version: &str, script: Option<&str>) -> Result<bool> {
        for (_, record) in self.history(code)? {
            if record.version != version {
                continue;
            }
            match (&record.step, script) {
                (UpdateStep::Comment(_), None) => return Ok(true),
                (UpdateStep::Script(name), Some(script)) if name == script => return Ok(true),
                _ => {}
            }
        }
        Ok(false)
    }

    /// Append a history row, committed immediately so an interrupted run
    /// resumes idempotently
    pub fn record_history(&self, code: &str, version: &str, step: UpdateStep) -> Result<u64> {
        let seq = self.next_seq()?;
        let record = HistoryRecord {
            code: code.to_string(),
            version: version.to_string(),
            step,
            applied_at: current_timestamp(),
        };
        self.history
            .insert(&seq.to_be_bytes(), &bincode::serialize(&record)?)?;
        self.db.flush()?;
        Ok(seq)
    }

    /// Delete a single history row
    pub fn remove_history(&self, seq: u64) -> Result<()> {
        self.history.remove(&seq.to_be_bytes())?;
        self.db.flush()
    }

    /// Unconditionally delete all version and history rows for a module.
    /// Returns whether anything was deleted.
    pub fn purge(&self, code: &str) -> Result<bool> {
        let mut deleted = false;

        let key = version_key(code);
        if self.versions.contains_key(key.as_bytes())? {
            self.versions.remove(key.as_bytes())?;
            deleted = true;
        }

        for (seq, _) in self.history(code)? {
            self.history.remove(&seq.to_be_bytes())?;
            deleted = true;
        }

        self.db.flush()?;
        Ok(deleted)
    }

    //
    // Counters
    //

    /// Pending "available updates" counter
    pub fn update_count(&self) -> Result<u64> {
        match self.meta.get(META_UPDATE_COUNT)? {
            Some(data) => decode_seq(&data),
            None => Ok(0),
        }
    }

    pub fn set_update_count(&self, count: u64) -> Result<()> {
        self.meta.insert(META_UPDATE_COUNT, &count.to_be_bytes())?;
        Ok(())
    }

    fn next_seq(&self) -> Result<u64> {
        let next = match self.meta.get(META_NEXT_SEQ)? {
            Some(data) => decode_seq(&data)?,
            None => 0,
        };
        self.meta.insert(META_NEXT_SEQ, &(next + 1).to_be_bytes())?;
        Ok(next)
    }
}

/// Lowercase lookup key; records keep the case-preserving identifier
fn version_key(code: &str) -> String {
    code.to_lowercase()
}

fn decode_seq(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| anyhow::anyhow!("malformed sequence key"))?;
    Ok(u64::from_be_bytes(bytes))
}
