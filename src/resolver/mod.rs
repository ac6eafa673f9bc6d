//! Module dependency resolution
//!
//! Computes required-but-missing modules, reconciles enablement state
//! against dependency availability, and produces a topologically sorted
//! activation order.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::enablement::EnablementStore;
use crate::registry::{ModuleDescriptor, ModuleRegistry};
use crate::traits::ModuleError;

/// Upper bound on resolution passes, guarding against an undetected cycle
const MAX_RESOLVE_PASSES: usize = 999;

/// Dependency resolver
pub struct DependencyResolver;

impl DependencyResolver {
    /// Declared dependencies of a module, or None if it declares none
    pub fn dependencies_of(descriptor: &ModuleDescriptor) -> Option<&[String]> {
        if descriptor.requires.is_empty() {
            None
        } else {
            Some(&descriptor.requires)
        }
    }

    /// Declared dependencies not present in the registry, across every
    /// registered module (disabled ones included, since reconciliation
    /// disables exactly the modules whose dependencies are missing),
    /// deduplicated. A dependency that is registered but disabled is not
    /// missing.
    pub fn find_missing(registry: &ModuleRegistry) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();

        for descriptor in registry.descriptors() {
            for require in &descriptor.requires {
                if registry.is_registered(require) {
                    continue;
                }
                if !missing.iter().any(|m| m.eq_ignore_ascii_case(require)) {
                    missing.push(require.clone());
                }
            }
        }

        missing
    }

    /// Cross-check every module's dependencies and disable/enable
    /// accordingly: a module whose dependency is absent from the registry
    /// or itself disabled is disabled (system-initiated); otherwise it is
    /// re-enabled (system-initiated, never overriding a user disable).
    ///
    /// Single pass in discovery order. A disablement made during the pass
    /// is visible to modules scanned later, but no fixed point is computed;
    /// callers needing a full cascade across arbitrary orderings re-invoke
    /// this method.
    pub fn reconcile(
        registry: &mut ModuleRegistry,
        enablement: &mut EnablementStore,
    ) -> Result<(), ModuleError> {
        let ids: Vec<String> = registry.identifiers().map(str::to_string).collect();

        for id in ids {
            let requires = match registry.get(&id) {
                Some(descriptor) if !descriptor.requires.is_empty() => descriptor.requires.clone(),
                _ => continue,
            };

            let unmet = requires.iter().any(|require| match registry.get(require) {
                None => true,
                Some(dependency) => dependency.disabled,
            });

            if unmet {
                if enablement.disable(&id, false)? {
                    info!("Disabling {} (unmet dependencies)", id);
                }
            } else if enablement.enable(&id, false)? {
                info!("Re-enabling {} (dependencies satisfied)", id);
            }

            let disabled = enablement.is_disabled(&id);
            registry.mark_disabled(&id, disabled);
        }

        Ok(())
    }

    /// Topologically sort the given modules so every module follows all
    /// of its in-set dependencies. Tie-break among independently ready
    /// modules is input order. Dependencies outside the candidate set are
    /// ignored.
    ///
    /// Fails with [`ModuleError::Resolution`] when a pass makes no
    /// progress or the pass bound is exceeded; modules with unresolved
    /// dependencies are never silently returned.
    pub fn topological_order(
        candidates: &[&ModuleDescriptor],
    ) -> Result<Vec<String>, ModuleError> {
        let candidate_ids: HashSet<String> = candidates
            .iter()
            .map(|descriptor| descriptor.identifier.to_lowercase())
            .collect();

        let mut result: Vec<String> = Vec::with_capacity(candidates.len());
        let mut placed: HashSet<String> = HashSet::with_capacity(candidates.len());
        let mut checklist: Vec<&ModuleDescriptor> = candidates.to_vec();

        let mut passes = 0;
        while !checklist.is_empty() {
            passes += 1;
            if passes > MAX_RESOLVE_PASSES {
                return Err(Self::unresolved_error(&checklist));
            }

            let before = checklist.len();

            checklist.retain(|descriptor| {
                // Dependencies not in the candidate set are dropped
                let ready = descriptor
                    .requires
                    .iter()
                    .map(|require| require.to_lowercase())
                    .filter(|require| candidate_ids.contains(require))
                    .all(|require| placed.contains(&require));

                if ready {
                    placed.insert(descriptor.identifier.to_lowercase());
                    result.push(descriptor.identifier.clone());
                    false
                } else {
                    true
                }
            });

            // No placement this pass means none will ever happen
            if checklist.len() == before {
                return Err(Self::unresolved_error(&checklist));
            }
        }

        debug!("Dependency resolution complete: {:?}", result);
        Ok(result)
    }

    fn unresolved_error(checklist: &[&ModuleDescriptor]) -> ModuleError {
        ModuleError::Resolution {
            unresolved: checklist
                .iter()
                .map(|descriptor| descriptor.identifier.clone())
                .collect(),
        }
    }
}
