//! Version and migration tracking
//!
//! Per-module version manifests, the durable applied-version/history
//! store, and the tracker that applies and rolls back the delta
//! between them.

pub mod manifest;
pub mod store;
pub mod tracker;
pub mod version;

pub use manifest::{ManifestEntry, UpdateStep, VersionManifest, MANIFEST_FILE, SCRIPT_EXTENSIONS};
pub use store::{HistoryRecord, VersionRecord, VersionStore};
pub use tracker::VersionTracker;
pub use version::Version;
