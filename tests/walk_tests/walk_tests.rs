//! Tests for ordered walks
//!
//! These tests verify:
//! - Keys are visited in ascending order from the start key
//! - Stop ends the walk successfully, Fail propagates the error
//! - Deleted entries are visited by `walk` and skipped by `walk_docs`
//! - Reads through the walk handle
//! - No key is visited twice while another thread commits

use std::path::PathBuf;
use std::thread;

use atlasdoc::{AtlasError, DocInfo, Document, Store, WalkOutcome, WalkSignal};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store(keys: &[&str]) -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let path: PathBuf = temp_dir.path().join("walk.atlasdoc");
    let store = Store::open(&path, true).unwrap();
    for key in keys {
        store
            .set(DocInfo::new(key), Document::new(key, format!("value-{}", key)))
            .unwrap();
    }
    store.commit().unwrap();
    (temp_dir, store)
}

fn collect_ids(store: &Store, start: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let outcome = store
        .walk(start, |_, info| {
            ids.push(info.id_str().into_owned());
            WalkSignal::Continue
        })
        .unwrap();
    assert_eq!(outcome, WalkOutcome::Exhausted);
    ids
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_walk_visits_in_key_order() {
    let (_temp, store) = setup_store(&["d", "b", "a", "c"]);

    assert_eq!(collect_ids(&store, ""), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_walk_from_start_key() {
    let (_temp, store) = setup_store(&["a", "b", "c", "d"]);

    assert_eq!(collect_ids(&store, "b"), vec!["b", "c", "d"]);
}

#[test]
fn test_walk_from_absent_start_key() {
    let (_temp, store) = setup_store(&["a", "c", "e"]);

    assert_eq!(collect_ids(&store, "b"), vec!["c", "e"]);
    assert!(collect_ids(&store, "f").is_empty());
}

#[test]
fn test_walk_empty_store() {
    let (_temp, store) = setup_store(&[]);

    assert!(collect_ids(&store, "").is_empty());
}

// =============================================================================
// Termination Tests
// =============================================================================

#[test]
fn test_stop_ends_walk_successfully() {
    let (_temp, store) = setup_store(&["a", "b", "c", "d"]);
    let mut ids = Vec::new();

    let outcome = store
        .walk("b", |_, info| {
            ids.push(info.id_str().into_owned());
            if info.id() == b"c" {
                WalkSignal::Stop
            } else {
                WalkSignal::Continue
            }
        })
        .unwrap();

    assert_eq!(outcome, WalkOutcome::Stopped);
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn test_fail_propagates_visitor_error() {
    let (_temp, store) = setup_store(&["a", "b", "c"]);
    let mut visited = 0;

    let result = store.walk("", |_, _| {
        visited += 1;
        WalkSignal::Fail(AtlasError::InvalidArgument("bad entry".to_string()))
    });

    assert!(matches!(result, Err(AtlasError::InvalidArgument(msg)) if msg == "bad entry"));
    assert_eq!(visited, 1);
}

#[test]
fn test_cancelled_from_visitor_is_a_stop() {
    let (_temp, store) = setup_store(&["a", "b", "c"]);
    let mut visited = 0;

    let outcome = store
        .walk("", |_, _| {
            visited += 1;
            WalkSignal::Fail(AtlasError::Cancelled)
        })
        .unwrap();

    assert_eq!(outcome, WalkOutcome::Stopped);
    assert_eq!(visited, 1);
}

#[test]
fn test_cancelled_from_walk_docs_visitor_is_a_stop() {
    let (_temp, store) = setup_store(&["a", "b"]);

    let outcome = store
        .walk_docs("", |_, _, _| WalkSignal::Fail(AtlasError::Cancelled))
        .unwrap();

    assert_eq!(outcome, WalkOutcome::Stopped);
}

// =============================================================================
// Document Walk Tests
// =============================================================================

#[test]
fn test_walk_docs_yields_bodies() {
    let (_temp, store) = setup_store(&["a", "b"]);
    let mut seen = Vec::new();

    store
        .walk_docs("", |_, info, doc| {
            assert_eq!(info.id(), doc.id());
            seen.push(doc.value_str().into_owned());
            WalkSignal::Continue
        })
        .unwrap();

    assert_eq!(seen, vec!["value-a", "value-b"]);
}

#[test]
fn test_tombstones_visible_in_walk_skipped_in_walk_docs() {
    let (_temp, store) = setup_store(&["a", "b", "c"]);
    store.delete("b").unwrap();
    store.commit().unwrap();

    let mut deleted = Vec::new();
    store
        .walk("", |_, info| {
            if info.is_deleted() {
                deleted.push(info.id_str().into_owned());
            }
            WalkSignal::Continue
        })
        .unwrap();
    assert_eq!(deleted, vec!["b"]);

    let mut live = Vec::new();
    store
        .walk_docs("", |_, info, _| {
            live.push(info.id_str().into_owned());
            WalkSignal::Continue
        })
        .unwrap();
    assert_eq!(live, vec!["a", "c"]);
}

#[test]
fn test_walk_docs_stop() {
    let (_temp, store) = setup_store(&["a", "b", "c"]);
    let mut count = 0;

    let outcome = store
        .walk_docs("", |_, _, _| {
            count += 1;
            WalkSignal::Stop
        })
        .unwrap();

    assert_eq!(outcome, WalkOutcome::Stopped);
    assert_eq!(count, 1);
}

// =============================================================================
// Walk Handle Tests
// =============================================================================

#[test]
fn test_handle_reads_other_documents() {
    let (_temp, store) = setup_store(&["a", "b"]);
    let mut pairs = Vec::new();

    store
        .walk("", |handle, info| {
            let other = if info.id() == b"a" { "b" } else { "a" };
            let (doc, _) = handle.get(other).unwrap();
            pairs.push((info.id_str().into_owned(), doc.value_str().into_owned()));
            WalkSignal::Continue
        })
        .unwrap();

    assert_eq!(
        pairs,
        vec![
            ("a".to_string(), "value-b".to_string()),
            ("b".to_string(), "value-a".to_string()),
        ]
    );
}

#[test]
fn test_handle_open_body_and_info() {
    let (_temp, store) = setup_store(&["a"]);

    store
        .walk("", |handle, info| {
            let doc = handle.open_body(info).unwrap();
            assert_eq!(doc.value(), b"value-a");
            assert_eq!(handle.info().unwrap().doc_count, 1);
            WalkSignal::Continue
        })
        .unwrap();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_no_duplicates_while_committing() {
    let (_temp, store) = setup_store(&["k000", "k050", "k100"]);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..100 {
                let key = format!("k{:03}", i);
                store.set(DocInfo::new(&key), Document::new(&key, "x")).unwrap();
                store.commit().unwrap();
            }
        });

        for _ in 0..20 {
            let ids = collect_ids(&store, "");
            for pair in ids.windows(2) {
                assert!(pair[0] < pair[1], "{} then {}", pair[0], pair[1]);
            }
        }
    });

    assert_eq!(collect_ids(&store, "").len(), 101);
}

#[test]
fn test_walk_on_closed_store() {
    let (_temp, store) = setup_store(&["a"]);
    store.close();

    let result = store.walk("", |_, _| WalkSignal::Continue);

    assert!(matches!(result, Err(AtlasError::Closed)));
}
