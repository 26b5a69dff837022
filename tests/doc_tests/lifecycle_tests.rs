//! Tests for engine-issued handle lifecycles
//!
//! These tests verify:
//! - Every handle the engine issues is released once its value drops
//! - Clones share one lease
//! - Caller-built values hold no lease
//! - Releases after the store closed are still accounted for

use std::sync::Arc;

use atlasdoc::doc::HandleKind;
use atlasdoc::engine::HandleRegistry;
use atlasdoc::{DocInfo, Document, FileEngine, StorageEngine, Store, WalkSignal};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("leases.atlasdoc"), true).unwrap();
    for key in ["a", "b", "c"] {
        store.set(DocInfo::new(key), Document::new(key, key)).unwrap();
    }
    store.commit().unwrap();
    (temp_dir, store)
}

// =============================================================================
// Store-Level Tests
// =============================================================================

#[test]
fn test_get_handles_released_on_drop() {
    let (_temp, store) = setup_store();

    let (doc, info) = store.get("a").unwrap();
    assert!(doc.is_engine_owned());
    assert!(info.is_engine_owned());
    assert_eq!(store.live_handles().unwrap(), 2);

    drop(doc);
    assert_eq!(store.live_handles().unwrap(), 1);
    drop(info);
    assert_eq!(store.live_handles().unwrap(), 0);
}

#[test]
fn test_clones_share_one_lease() {
    let (_temp, store) = setup_store();

    let (doc, info) = store.get("b").unwrap();
    let doc_copy = doc.clone();
    let info_copy = info.clone();
    drop(doc);
    drop(info);
    assert_eq!(store.live_handles().unwrap(), 2);

    drop(doc_copy);
    drop(info_copy);
    assert_eq!(store.live_handles().unwrap(), 0);
}

#[test]
fn test_walk_releases_every_handle() {
    let (_temp, store) = setup_store();

    store
        .walk_docs("", |_, _, _| WalkSignal::Continue)
        .unwrap();
    store.walk("", |_, _| WalkSignal::Stop).unwrap();

    assert_eq!(store.live_handles().unwrap(), 0);
}

#[test]
fn test_value_outlives_store() {
    let (_temp, store) = setup_store();
    let (doc, _) = store.get("c").unwrap();

    store.close();

    assert_eq!(doc.value(), b"c");
}

#[test]
fn test_caller_values_hold_no_lease() {
    let info = DocInfo::new("x");
    let doc = Document::new("x", "y");

    assert!(!info.is_engine_owned());
    assert!(!doc.is_engine_owned());
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_engine_counts_issue_and_release() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = FileEngine::open_path(&temp_dir.path().join("e.atlasdoc"), true).unwrap();
    engine.save(DocInfo::new("a"), Document::new("a", "1")).unwrap();
    engine.commit().unwrap();

    for _ in 0..10 {
        let info = engine.lookup_by_id(b"a").unwrap();
        let _doc = engine.open_body(&info).unwrap();
    }

    let handles = engine.handles();
    assert_eq!(handles.issued_count(), 20);
    assert_eq!(handles.released_count(), 20);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_registry_release_after_owner_dropped() {
    let registry = HandleRegistry::new();
    let info_lease = registry.issue(HandleKind::Info);
    let doc_lease = registry.issue(HandleKind::Doc);
    let weak = Arc::downgrade(&registry);
    drop(registry);

    // Leases keep the registry alive
    let registry = weak.upgrade().unwrap();
    assert_eq!(registry.live_count(), 2);

    drop(info_lease);
    drop(doc_lease);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.released_count(), 2);
}
