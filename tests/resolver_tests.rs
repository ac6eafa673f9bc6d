//! Dependency resolution and activation-order tests

mod common;

use common::HostFixture;
use modhost::{DependencyResolver, EnablementStore, ModuleError, ModuleRegistry};

fn order_of(registry: &ModuleRegistry) -> Result<Vec<String>, ModuleError> {
    let enabled: Vec<_> = registry.enabled().collect();
    DependencyResolver::topological_order(&enabled)
}

#[test]
fn activation_order_respects_dependencies() {
    let fixture = HostFixture::new().unwrap();
    // Discovery order (alphabetical) is Blog, Core, Shop; dependency
    // order must put Core first regardless
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["Acme.Core"]);
    fixture.create_module("Acme.Shop", &["Acme.Blog"]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let order = order_of(&registry).unwrap();

    assert_eq!(order, vec!["Acme.Core", "Acme.Blog", "Acme.Shop"]);
}

#[test]
fn independent_modules_keep_input_order() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Blog", &[]);
    fixture.create_module("Acme.Shop", &[]);
    fixture.create_module("Zeta.Tool", &[]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let order = order_of(&registry).unwrap();

    assert_eq!(order, vec!["Acme.Blog", "Acme.Shop", "Zeta.Tool"]);
}

#[test]
fn every_module_appears_exactly_once() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["Acme.Core"]);
    fixture.create_module("Acme.Shop", &["Acme.Core", "Acme.Blog"]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let order = order_of(&registry).unwrap();

    assert_eq!(order.len(), 3);
    let mut sorted = order.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 3);
}

#[test]
fn dependency_matching_is_case_insensitive() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["acme.CORE"]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let order = order_of(&registry).unwrap();

    assert_eq!(order, vec!["Acme.Core", "Acme.Blog"]);
}

#[test]
fn cycle_is_reported_not_looped() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Blog", &["Acme.Shop"]);
    fixture.create_module("Acme.Shop", &["Acme.Blog"]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let result = order_of(&registry);

    match result {
        Err(ModuleError::Resolution { unresolved }) => {
            assert_eq!(unresolved.len(), 2);
            assert!(unresolved.contains(&"Acme.Blog".to_string()));
            assert!(unresolved.contains(&"Acme.Shop".to_string()));
        }
        other => panic!("expected resolution failure, got {:?}", other),
    }
}

#[test]
fn dependencies_outside_candidate_set_are_ignored() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Blog", &["Other.Absent"]);
    fixture.create_module("Acme.Shop", &[]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let order = order_of(&registry).unwrap();

    assert_eq!(order, vec!["Acme.Blog", "Acme.Shop"]);
}

#[test]
fn find_missing_deduplicates_across_modules() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Blog", &["Other.Absent"]);
    fixture.create_module("Acme.Shop", &["other.absent", "More.Gone"]);

    let registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let missing = DependencyResolver::find_missing(&registry);

    assert_eq!(missing.len(), 2);
    assert!(missing.iter().any(|m| m.eq_ignore_ascii_case("Other.Absent")));
    assert!(missing.iter().any(|m| m.eq_ignore_ascii_case("More.Gone")));
}

#[test]
fn disabled_dependency_is_not_missing() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["Acme.Core"]);

    let mut registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    registry.mark_disabled("Acme.Core", true);

    // Present but disabled is an enablement problem, not a missing one
    assert!(DependencyResolver::find_missing(&registry).is_empty());
}

#[test]
fn reconcile_disables_modules_with_absent_dependencies() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Blog", &["Other.Absent"]);
    fixture.create_module("Acme.Shop", &[]);

    let mut registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let mut enablement =
        EnablementStore::load(fixture.cache_path(), &[], || Ok(Vec::new())).unwrap();

    DependencyResolver::reconcile(&mut registry, &mut enablement).unwrap();

    assert!(enablement.is_disabled("Acme.Blog"));
    assert!(!enablement.is_disabled("Acme.Shop"));
    assert!(registry.get("Acme.Blog").unwrap().disabled);
}

#[test]
fn reconcile_cascades_through_dependents() {
    let fixture = HostFixture::new().unwrap();
    // Scan order is Blog, Core, Shop: Blog sees the disabled Core, and
    // Shop sees Blog's in-pass disablement
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["Acme.Core"]);
    fixture.create_module("Acme.Shop", &["Acme.Blog"]);

    let mut registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let mut enablement =
        EnablementStore::load(fixture.cache_path(), &[], || Ok(Vec::new())).unwrap();

    enablement.disable("Acme.Core", false).unwrap();
    registry.mark_disabled("Acme.Core", true);

    DependencyResolver::reconcile(&mut registry, &mut enablement).unwrap();

    assert!(enablement.is_disabled("Acme.Blog"));
    assert!(enablement.is_disabled("Acme.Shop"));
}

#[test]
fn reconcile_reenables_when_dependencies_return() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["Acme.Core"]);

    let mut registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let mut enablement =
        EnablementStore::load(fixture.cache_path(), &[], || Ok(Vec::new())).unwrap();

    enablement.disable("Acme.Core", false).unwrap();
    registry.mark_disabled("Acme.Core", true);
    DependencyResolver::reconcile(&mut registry, &mut enablement).unwrap();
    assert!(enablement.is_disabled("Acme.Blog"));

    enablement.enable("Acme.Core", false).unwrap();
    registry.mark_disabled("Acme.Core", false);
    DependencyResolver::reconcile(&mut registry, &mut enablement).unwrap();

    assert!(!enablement.is_disabled("Acme.Blog"));
    assert!(!registry.get("Acme.Blog").unwrap().disabled);
}

#[test]
fn reconcile_never_overrides_a_user_disable() {
    let fixture = HostFixture::new().unwrap();
    fixture.create_module("Acme.Core", &[]);
    fixture.create_module("Acme.Blog", &["Acme.Core"]);

    let mut registry = ModuleRegistry::discover(&fixture.modules_dir).unwrap();
    let mut enablement =
        EnablementStore::load(fixture.cache_path(), &[], || Ok(Vec::new())).unwrap();

    enablement.disable("Acme.Blog", true).unwrap();
    registry.mark_disabled("Acme.Blog", true);

    DependencyResolver::reconcile(&mut registry, &mut enablement).unwrap();

    assert!(enablement.is_disabled("Acme.Blog"));
    assert!(registry.get("Acme.Blog").unwrap().disabled);
}
