//! Module system traits and interfaces
//!
//! Defines the error taxonomy and the seams between the lifecycle manager
//! and host-provided behavior: lifecycle hooks, seed-data providers,
//! migration script execution and progress-note streaming.

use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised by the module lifecycle subsystem
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A module definition file could not be read or parsed
    #[error("invalid module definition: {0}")]
    InvalidDefinition(String),

    /// A module identifier is not present in the registry
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Dependency resolution could not make progress
    #[error("dependency cycle or unresolvable set: {unresolved:?}")]
    Resolution {
        /// Identifiers still unresolved when the resolver gave up
        unresolved: Vec<String>,
    },

    /// A version string is not dot-separated numeric segments
    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    /// Durable-store or cache-file I/O failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A migration script failed while executing
    #[error("script error: {0}")]
    Script(String),
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        // The storage layer reports through anyhow; everything crossing
        // into the lifecycle components is a persistence failure
        ModuleError::Persistence(format!("{:#}", e))
    }
}

/// Lifecycle hooks a host attaches to a registered module.
///
/// Hooks are opaque to the lifecycle core: the orchestrator only decides
/// *whether* and *in what order* they run. Modules without attached hooks
/// are managed normally (migrations, enablement) and simply have no
/// register/boot behavior.
pub trait ModuleHooks: Send {
    /// Called once per process start for every enabled module,
    /// in dependency order, before any module is booted.
    fn register(&mut self) -> Result<(), ModuleError>;

    /// Called after every enabled module has been registered.
    fn boot(&mut self) -> Result<(), ModuleError>;
}

/// Capability for modules that seed initial data on first install.
///
/// Opt-in: a module declares the capability by registering a `Seeder`
/// with the orchestrator. The seed step runs once, on the first
/// `update()` that bootstraps the migration store.
pub trait Seeder: Send {
    fn seed(&mut self) -> Result<(), ModuleError>;
}

/// Executes migration script files referenced by a version manifest.
///
/// Script semantics are host-defined. The tracker only guarantees
/// ordering and idempotence: `run_up` is invoked at most once per
/// recorded (module, version, script) tuple, and `run_down` exactly
/// once when that tuple is rolled back.
pub trait ScriptRunner: Send + Sync {
    /// Apply a migration script.
    fn run_up(&self, module: &str, script: &Path) -> Result<(), ModuleError>;

    /// Revert a previously applied migration script.
    fn run_down(&self, module: &str, script: &Path) -> Result<(), ModuleError>;
}

/// Default runner: logs each invocation without executing anything.
///
/// Useful for hosts that treat scripts as bookkeeping markers, and for
/// dry runs against a real module tree.
#[derive(Debug, Default)]
pub struct LogOnlyRunner;

impl ScriptRunner for LogOnlyRunner {
    fn run_up(&self, module: &str, script: &Path) -> Result<(), ModuleError> {
        info!("{}: script up {}", module, script.display());
        Ok(())
    }

    fn run_down(&self, module: &str, script: &Path) -> Result<(), ModuleError> {
        info!("{}: script down {}", module, script.display());
        Ok(())
    }
}

/// Receives progress notes as they are produced.
pub trait NoteSink: Send {
    fn write_note(&mut self, line: &str);
}

/// Collector for human-readable progress notes.
///
/// Notes accumulate in memory and, when a sink is attached, stream to it
/// line-by-line as they occur.
#[derive(Default)]
pub struct Notes {
    lines: Vec<String>,
    sink: Option<Box<dyn NoteSink>>,
}

impl Notes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a streaming sink. Notes are still collected in memory.
    pub fn with_sink(sink: Box<dyn NoteSink>) -> Self {
        Self {
            lines: Vec::new(),
            sink: Some(sink),
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        if let Some(sink) = self.sink.as_mut() {
            sink.write_note(&line);
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }
}

impl std::fmt::Debug for Notes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notes")
            .field("lines", &self.lines)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
