//! Enablement store and disabled-cache tests

mod common;

use common::HostFixture;
use modhost::EnablementStore;

fn load_empty(fixture: &HostFixture, config_disabled: &[String]) -> EnablementStore {
    EnablementStore::load(fixture.cache_path(), config_disabled, || Ok(Vec::new())).unwrap()
}

#[test]
fn disable_enable_round_trip() {
    let fixture = HostFixture::new().unwrap();
    let mut store = load_empty(&fixture, &[]);

    assert!(!store.is_disabled("Acme.Blog"));
    assert!(store.disable("Acme.Blog", true).unwrap());
    assert!(store.is_disabled("Acme.Blog"));

    // Already disabled, nothing to do
    assert!(!store.disable("Acme.Blog", true).unwrap());

    assert!(store.enable("Acme.Blog", true).unwrap());
    assert!(!store.is_disabled("Acme.Blog"));
    assert!(!store.enable("Acme.Blog", true).unwrap());
}

#[test]
fn matching_is_case_insensitive() {
    let fixture = HostFixture::new().unwrap();
    let mut store = load_empty(&fixture, &[]);

    store.disable("Acme.Blog", true).unwrap();
    assert!(store.is_disabled("acme.blog"));
    assert!(store.enable("ACME.BLOG", true).unwrap());
    assert!(!store.is_disabled("Acme.Blog"));
}

#[test]
fn user_disable_blocks_system_enable() {
    let fixture = HostFixture::new().unwrap();
    let mut store = load_empty(&fixture, &[]);

    store.disable("Acme.Blog", true).unwrap();

    // Dependency reconciliation must not undo an explicit user choice
    assert!(!store.enable("Acme.Blog", false).unwrap());
    assert!(store.is_disabled("Acme.Blog"));

    assert!(store.enable("Acme.Blog", true).unwrap());
    assert!(!store.is_disabled("Acme.Blog"));
}

#[test]
fn system_disable_can_be_system_enabled() {
    let fixture = HostFixture::new().unwrap();
    let mut store = load_empty(&fixture, &[]);

    store.disable("Acme.Blog", false).unwrap();
    assert!(store.enable("Acme.Blog", false).unwrap());
    assert!(!store.is_disabled("Acme.Blog"));
}

#[test]
fn config_declared_disables_always_apply() {
    let fixture = HostFixture::new().unwrap();
    let config_disabled = vec!["Acme.Blog".to_string()];
    let mut store = load_empty(&fixture, &config_disabled);

    assert!(store.is_disabled("acme.blog"));

    // Not even the user can enable a config-declared disable at runtime
    assert!(!store.enable("Acme.Blog", true).unwrap());
    assert!(store.is_disabled("Acme.Blog"));
}

#[test]
fn config_declared_disables_are_not_persisted() {
    let fixture = HostFixture::new().unwrap();
    let config_disabled = vec!["Acme.Blog".to_string()];
    let mut store = load_empty(&fixture, &config_disabled);

    store.disable("Acme.Shop", true).unwrap();

    let cache = std::fs::read_to_string(fixture.cache_path()).unwrap();
    assert!(cache.contains("Acme.Shop"));
    assert!(!cache.contains("Acme.Blog"));
}

#[test]
fn cache_file_carries_format_tag_and_reasons() {
    let fixture = HostFixture::new().unwrap();
    let mut store = load_empty(&fixture, &[]);

    store.disable("Acme.Blog", true).unwrap();
    store.disable("Acme.Shop", false).unwrap();

    let cache: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture.cache_path()).unwrap()).unwrap();
    assert_eq!(cache["format"], 1);
    assert_eq!(cache["disabled"]["Acme.Blog"], "user");
    assert_eq!(cache["disabled"]["Acme.Shop"], "system");
}

#[test]
fn absent_cache_bootstraps_from_durable_store() {
    let fixture = HostFixture::new().unwrap();
    let store = EnablementStore::load(fixture.cache_path(), &[], || {
        Ok(vec!["Acme.Blog".to_string()])
    })
    .unwrap();

    assert!(store.is_disabled("Acme.Blog"));
    assert!(fixture.cache_path().is_file());

    // A present cache short-circuits the bootstrap entirely
    let reloaded = EnablementStore::load(fixture.cache_path(), &[], || {
        Ok(vec!["Should.NotAppear".to_string()])
    })
    .unwrap();
    assert!(reloaded.is_disabled("Acme.Blog"));
    assert!(!reloaded.is_disabled("Should.NotAppear"));
}

#[test]
fn corrupt_cache_fails_open() {
    let fixture = HostFixture::new().unwrap();
    std::fs::write(fixture.cache_path(), "{ not json").unwrap();

    let config_disabled = vec!["Acme.Shop".to_string()];
    let mut store =
        EnablementStore::load(fixture.cache_path(), &config_disabled, || Ok(Vec::new())).unwrap();

    // Cache layer treated as empty, config layer still applies
    assert!(!store.is_disabled("Acme.Blog"));
    assert!(store.is_disabled("Acme.Shop"));

    // The next write replaces the corrupt file with a valid one
    store.disable("Acme.Blog", true).unwrap();
    let cache: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture.cache_path()).unwrap()).unwrap();
    assert_eq!(cache["disabled"]["Acme.Blog"], "user");
}

#[test]
fn clear_removes_cache_file() {
    let fixture = HostFixture::new().unwrap();
    let mut store = load_empty(&fixture, &[]);

    store.disable("Acme.Blog", true).unwrap();
    assert!(fixture.cache_path().is_file());

    store.clear().unwrap();
    assert!(!fixture.cache_path().is_file());
    assert!(!store.is_disabled("Acme.Blog"));
}
