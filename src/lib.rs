//! Modhost - extension-module lifecycle manager
//!
//! This crate decides *which* modules of a modular application run, in
//! *what order*, and *which* of their schema migrations have been
//! applied. It provides:
//!
//! - **Module registry**: discovers `<Vendor>/<Module>` directory pairs
//!   holding a `module.toml` definition and owns one descriptor per
//!   module.
//! - **Enablement store**: persistent disabled-module set with a
//!   fast-path cache file, distinguishing user from system disablement.
//! - **Dependency resolver**: missing-dependency detection, enablement
//!   reconciliation and topologically sorted activation order with
//!   cycle detection.
//! - **Version tracker**: per-module version manifests applied
//!   incrementally and idempotently against a durable history, with
//!   rollback and purge.
//! - **Lifecycle orchestrator**: composes the above and drives
//!   register/boot hooks and migrations.
//!
//! ## Design principles
//!
//! 1. **Partial-failure isolation**: one broken module never aborts
//!    discovery or a whole update run.
//! 2. **Idempotence**: every migration operation is committed to history
//!    immediately; re-running applies only what is genuinely missing.
//! 3. **Explicit state**: no lazy global caches - components are built
//!    from an explicit config and reloaded explicitly.
//!
//! Execution is synchronous and single-threaded; cross-process
//! serialization of update runs is the embedder's responsibility.

pub mod config;
pub mod enablement;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod traits;
pub mod utils;
pub mod versioning;

pub use config::HostConfig;
pub use enablement::{DisableReason, EnablementStore};
pub use lifecycle::LifecycleManager;
pub use registry::{ModuleDescriptor, ModuleRegistry};
pub use resolver::DependencyResolver;
pub use traits::{
    LogOnlyRunner, ModuleError, ModuleHooks, NoteSink, Notes, ScriptRunner, Seeder,
};
pub use versioning::{UpdateStep, Version, VersionManifest, VersionTracker};
