//! Lifecycle orchestrator
//!
//! Composes the registry, enablement store, dependency resolver and
//! version tracker: loads modules, filters by enablement, resolves the
//! activation order, and drives hook invocation and migration
//! application per module.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::HostConfig;
use crate::enablement::EnablementStore;
use crate::registry::ModuleRegistry;
use crate::resolver::DependencyResolver;
use crate::storage::open_database;
use crate::traits::{LogOnlyRunner, ModuleError, ModuleHooks, NoteSink, Notes, ScriptRunner, Seeder};
use crate::versioning::{ManifestEntry, Version, VersionStore, VersionTracker};

/// Orchestrates the full module lifecycle for one host process
pub struct LifecycleManager {
    config: HostConfig,
    registry: ModuleRegistry,
    enablement: EnablementStore,
    tracker: VersionTracker,
    /// Host-attached lifecycle hooks, keyed by lowercase identifier
    hooks: HashMap<String, Box<dyn ModuleHooks>>,
    /// First-install seed capabilities, keyed by lowercase identifier
    seeders: HashMap<String, Box<dyn Seeder>>,
    notes: Notes,
    /// Suppresses register/boot for non-elevated modules
    no_init: bool,
    registered: bool,
    booted: bool,
}

impl LifecycleManager {
    /// Open the manager with the default (logging) script runner
    pub fn open(config: HostConfig) -> Result<Self, ModuleError> {
        Self::open_with_runner(config, Box::new(LogOnlyRunner))
    }

    /// Open the manager: durable store, module discovery, enablement
    /// load (with one-time bootstrap from the store) and dependency
    /// reconciliation.
    pub fn open_with_runner(
        config: HostConfig,
        runner: Box<dyn ScriptRunner>,
    ) -> Result<Self, ModuleError> {
        let db = open_database(config.data_dir().join("store"))?;
        let store = Arc::new(VersionStore::new(db)?);
        let tracker = VersionTracker::new(Arc::clone(&store), runner);

        let mut registry = ModuleRegistry::discover(config.modules_dir())?;

        let bootstrap_store = Arc::clone(&store);
        let mut enablement = EnablementStore::load(
            config.disabled_cache_file(),
            &config.disabled_modules,
            move || bootstrap_store.disabled_codes().map_err(ModuleError::from),
        )?;

        // Mirror enablement state onto the descriptors at load time
        let ids: Vec<String> = registry.identifiers().map(str::to_string).collect();
        for id in &ids {
            if enablement.is_disabled(id) {
                registry.mark_disabled(id, true);
            }
        }

        DependencyResolver::reconcile(&mut registry, &mut enablement)?;

        info!(
            "Lifecycle manager ready: {} modules discovered",
            registry.len()
        );

        Ok(Self {
            no_init: config.no_init,
            config,
            registry,
            enablement,
            tracker,
            hooks: HashMap::new(),
            seeders: HashMap::new(),
            notes: Notes::new(),
            registered: false,
            booted: false,
        })
    }

    //
    // Composition accessors
    //

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<VersionStore> {
        self.tracker.store()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn is_no_init(&self) -> bool {
        self.no_init
    }

    /// Toggle the no-init safety flag. Suppresses hook invocation for
    /// non-elevated modules; migration application is never suppressed.
    pub fn set_no_init(&mut self, no_init: bool) {
        self.no_init = no_init;
    }

    //
    // Hooks
    //

    /// Attach lifecycle hooks for a module
    pub fn attach_hooks(&mut self, id: &str, hooks: Box<dyn ModuleHooks>) {
        self.hooks.insert(id.to_lowercase(), hooks);
    }

    /// Attach a first-install seeder for a module
    pub fn attach_seeder(&mut self, id: &str, seeder: Box<dyn Seeder>) {
        self.seeders.insert(id.to_lowercase(), seeder);
    }

    /// Invoke `register` on every enabled module's hooks in dependency
    /// order. Idempotent unless forced.
    pub fn register_all(&mut self, force: bool) -> Result<(), ModuleError> {
        if self.registered && !force {
            return Ok(());
        }
        for id in self.hook_targets()? {
            if let Some(hooks) = self.hooks.get_mut(&id.to_lowercase()) {
                hooks.register()?;
            }
        }
        self.registered = true;
        Ok(())
    }

    /// Invoke `boot` on every enabled module's hooks in dependency
    /// order. Idempotent unless forced.
    pub fn boot_all(&mut self, force: bool) -> Result<(), ModuleError> {
        if self.booted && !force {
            return Ok(());
        }
        for id in self.hook_targets()? {
            if let Some(hooks) = self.hooks.get_mut(&id.to_lowercase()) {
                hooks.boot()?;
            }
        }
        self.booted = true;
        Ok(())
    }

    /// Enabled modules in activation order whose hooks may run under the
    /// current no-init state
    fn hook_targets(&self) -> Result<Vec<String>, ModuleError> {
        let order = self.order()?;
        Ok(order
            .into_iter()
            .filter(|id| {
                let elevated = self
                    .registry
                    .get(id)
                    .map(|descriptor| descriptor.elevated)
                    .unwrap_or(false);
                !self.no_init || elevated
            })
            .collect())
    }

    //
    // Resolution
    //

    /// Topologically sorted activation order of the enabled modules
    pub fn order(&self) -> Result<Vec<String>, ModuleError> {
        let enabled: Vec<_> = self.registry.enabled().collect();
        DependencyResolver::topological_order(&enabled)
    }

    /// Declared dependencies absent from the registry, deduplicated
    pub fn find_missing_dependencies(&self) -> Vec<String> {
        DependencyResolver::find_missing(&self.registry)
    }

    //
    // Enablement
    //

    pub fn is_disabled(&self, id: &str) -> bool {
        self.enablement.is_disabled(id)
    }

    /// Disable a module and persist the state. Returns false if already
    /// disabled.
    pub fn disable(&mut self, id: &str, by_user: bool) -> Result<bool, ModuleError> {
        let code = self.canonical_or_verbatim(id);
        let changed = self.enablement.disable(&code, by_user)?;
        if changed {
            self.registry.mark_disabled(&code, true);
            self.store().set_disabled_flag(&code, true)?;
        }
        Ok(changed)
    }

    /// Enable a module and persist the state. Returns false if the module
    /// is not disabled, or when a system caller tries to override a user
    /// disable.
    pub fn enable(&mut self, id: &str, by_user: bool) -> Result<bool, ModuleError> {
        let code = self.canonical_or_verbatim(id);
        let changed = self.enablement.enable(&code, by_user)?;
        if changed {
            self.registry.mark_disabled(&code, false);
            self.store().set_disabled_flag(&code, false)?;
        }
        Ok(changed)
    }

    /// Delete the enablement cache file, forcing re-derivation from the
    /// durable store on next start
    pub fn clear_enablement_cache(&mut self) -> Result<(), ModuleError> {
        self.enablement.clear()
    }

    //
    // Migration
    //

    /// Pending manifest entries for one module
    pub fn pending(&self, id: &str) -> Result<Vec<ManifestEntry>, ModuleError> {
        self.tracker.pending_versions(&self.registry, id)
    }

    /// Bring every module up to date: bootstrap the migration store on
    /// first run, migrate built-in modules in listed order, then the
    /// remaining enabled modules in dependency order, and finally reset
    /// the pending-updates counter. The first run also seeds built-in
    /// modules that registered a seeder.
    pub fn update(&mut self) -> Result<(), ModuleError> {
        let first_up = !self.store().is_bootstrapped()?;
        if first_up {
            self.store().bootstrap()?;
            self.notes.note("Migration store created");
        }

        let built_in = self.config.built_in_modules.clone();
        for id in &built_in {
            self.update_one(id)?;
        }

        for id in self.order()? {
            if built_in.iter().any(|b| b.eq_ignore_ascii_case(&id)) {
                continue;
            }
            self.update_one(&id)?;
        }

        self.store().set_update_count(0)?;

        if first_up {
            for id in &built_in {
                if let Some(seeder) = self.seeders.get_mut(&id.to_lowercase()) {
                    seeder.seed()?;
                    self.notes.note(format!("Seeded {}", id));
                }
            }
        }

        Ok(())
    }

    /// Update a single module. An unknown identifier is a note, not an
    /// error.
    pub fn update_one(&mut self, id: &str) -> Result<(), ModuleError> {
        if !self.registry.is_registered(id) {
            self.notes.note(format!("- Unable to find: {}", id));
            return Ok(());
        }
        let code = self.canonical_or_verbatim(id);
        self.notes.note(code.clone());
        self.tracker
            .apply(&self.registry, &code, None, &mut self.notes)?;
        Ok(())
    }

    /// Roll back a single module completely. When the module's files no
    /// longer exist, its durable records are purged instead.
    pub fn rollback_one(&mut self, id: &str) -> Result<(), ModuleError> {
        self.rollback_one_to(id, None)
    }

    /// Roll back a single module down to (and including) `stop_at`
    pub fn rollback_one_to(
        &mut self,
        id: &str,
        stop_at: Option<&Version>,
    ) -> Result<(), ModuleError> {
        if !self.registry.is_registered(id) {
            if self.tracker.purge(id)? {
                self.notes.note(format!("- Purged from database: {}", id));
            } else {
                self.notes.note(format!("- Unable to find: {}", id));
            }
            return Ok(());
        }

        let code = self.canonical_or_verbatim(id);
        if self
            .tracker
            .rollback(&self.registry, &code, stop_at, &mut self.notes)?
        {
            self.notes.note(format!("- Rolled back: {}", code));
        } else {
            self.notes.note(format!("- Unable to find: {}", code));
        }
        Ok(())
    }

    /// Roll back then re-update one module (a full refresh of its
    /// migration state)
    pub fn refresh(&mut self, id: &str) -> Result<(), ModuleError> {
        self.rollback_one(id)?;
        self.update_one(id)
    }

    /// Roll back every known module in registration order, then drop the
    /// migration store entirely.
    pub fn uninstall(&mut self) -> Result<(), ModuleError> {
        let ids: Vec<String> = self.registry.identifiers().map(str::to_string).collect();
        for id in ids {
            self.rollback_one(&id)?;
        }
        self.store().drop_all()?;
        self.notes.note("Migration store dropped");
        Ok(())
    }

    //
    // Notes
    //

    pub fn notes(&self) -> &[String] {
        self.notes.lines()
    }

    pub fn reset_notes(&mut self) {
        self.notes.reset();
    }

    /// Attach a streaming sink; notes are still collected in memory
    pub fn set_note_sink(&mut self, sink: Box<dyn NoteSink>) {
        self.notes = Notes::with_sink(sink);
    }

    fn canonical_or_verbatim(&self, id: &str) -> String {
        self.registry
            .canonical(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }
}
