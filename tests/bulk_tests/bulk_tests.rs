//! Tests for the bulk writer
//!
//! These tests verify:
//! - Queued writes and deletions land in one commit
//! - Concurrent producers are all applied
//! - Deletions must arrive marked deleted
//! - Closing discards uncommitted instructions
//! - A failed apply skips the commit and clears the batch
//! - Handles fail with `Closed` once the writer is gone

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use atlasdoc::{
    AtlasError, DbInfo, DocInfo, Document, FileEngine, Result, StorageEngine, Store, StoreConfig,
    WalkSignal,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, PathBuf, Store) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bulk.atlasdoc");
    let store = Store::open(&path, true).unwrap();
    (temp_dir, path, store)
}

fn live_docs<E: StorageEngine>(store: &Store<E>) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    store
        .walk_docs("", |_, info, doc| {
            found.insert(info.id_str().into_owned(), doc.value_str().into_owned());
            WalkSignal::Continue
        })
        .unwrap();
    found
}

/// File engine that can be told to reject batches, and counts commits
struct FlakyEngine {
    inner: FileEngine,
    fail_apply: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl StorageEngine for FlakyEngine {
    fn save(&mut self, info: DocInfo, doc: Document) -> Result<()> {
        self.inner.save(info, doc)
    }

    fn apply_batch(&mut self, batch: Vec<(DocInfo, Document)>) -> Result<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(AtlasError::Engine("apply rejected".to_string()));
        }
        self.inner.apply_batch(batch)
    }

    fn commit(&mut self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit()
    }

    fn lookup_by_id(&self, id: &[u8]) -> Result<DocInfo> {
        self.inner.lookup_by_id(id)
    }

    fn open_body(&self, info: &DocInfo) -> Result<Document> {
        self.inner.open_body(info)
    }

    fn iterate_from(
        &self,
        start: &[u8],
        visitor: &mut dyn FnMut(DocInfo) -> Result<()>,
    ) -> Result<()> {
        self.inner.iterate_from(start, visitor)
    }

    fn info(&self) -> Result<DbInfo> {
        self.inner.info()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn live_handles(&self) -> usize {
        self.inner.live_handles()
    }
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_bulk_sets_and_delete_in_one_commit() {
    let (_temp, _path, store) = setup_temp_store();
    store
        .set(DocInfo::new("deleteme"), Document::new("deleteme", "val"))
        .unwrap();
    store.commit().unwrap();

    let bulk = store.bulk().unwrap();
    let mut expected = BTreeMap::new();
    for i in 0..13 {
        let (k, v) = (format!("k{}", i), format!("Value {}", i));
        bulk.set(DocInfo::new(&k), Document::new(&k, &v)).unwrap();
        expected.insert(k, v);
    }
    bulk.delete(DocInfo::tombstone("deleteme")).unwrap();

    // Nothing is visible before the commit
    assert_eq!(live_docs(&store).len(), 1);

    bulk.commit().unwrap();
    bulk.close();

    assert_eq!(live_docs(&store), expected);
    let info = store.info().unwrap();
    assert_eq!(info.doc_count, 13);
    assert_eq!(info.deleted_count, 1);
}

#[test]
fn test_bulk_commits_are_independent() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    bulk.set(DocInfo::new("a"), Document::new("a", "1")).unwrap();
    bulk.commit().unwrap();
    bulk.set(DocInfo::new("b"), Document::new("b", "2")).unwrap();
    bulk.commit().unwrap();
    bulk.commit().unwrap();

    assert_eq!(live_docs(&store).len(), 2);
    assert_eq!(store.info().unwrap().last_sequence, 2);
}

#[test]
fn test_bulk_later_instruction_wins() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    bulk.set(DocInfo::new("k"), Document::new("k", "first")).unwrap();
    bulk.set(DocInfo::new("k"), Document::new("k", "second")).unwrap();
    bulk.commit().unwrap();

    assert_eq!(store.get("k").unwrap().0.value_str(), "second");
    assert_eq!(store.get("k").unwrap().1.rev_seq(), 2);
}

#[test]
fn test_concurrent_producers() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 250;

    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    thread::scope(|s| {
        for p in 0..PRODUCERS {
            let producer = bulk.producer();
            s.spawn(move || {
                for i in 0..PER_PRODUCER {
                    let key = format!("p{}-{:04}", p, i);
                    producer.set(DocInfo::new(&key), Document::new(&key, "v")).unwrap();
                }
            });
        }
    });
    bulk.commit().unwrap();

    assert_eq!(live_docs(&store).len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(
        store.info().unwrap().last_sequence,
        (PRODUCERS * PER_PRODUCER) as u64
    );
}

#[test]
fn test_shared_writer_across_scoped_threads() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    thread::scope(|s| {
        for t in 0..4 {
            let bulk = &bulk;
            s.spawn(move || {
                for i in 0..10 {
                    let key = format!("t{}-{}", t, i);
                    bulk.set(DocInfo::new(&key), Document::new(&key, "v")).unwrap();
                }
                bulk.commit().unwrap();
            });
        }
    });

    assert_eq!(live_docs(&store).len(), 40);
}

// =============================================================================
// Deletion Tests
// =============================================================================

#[test]
fn test_unmarked_delete_rejected() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    let result = bulk.delete(DocInfo::new("k"));
    assert!(matches!(result, Err(AtlasError::InvalidArgument(_))));

    let mut info = DocInfo::new("k");
    info.set_deleted(true);
    assert!(bulk.producer().delete(info).is_ok());
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_discards_uncommitted() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    bulk.set(DocInfo::new("a"), Document::new("a", "1")).unwrap();
    bulk.commit().unwrap();
    bulk.set(DocInfo::new("b"), Document::new("b", "2")).unwrap();
    bulk.close();

    assert!(store.get("a").is_ok());
    assert!(matches!(store.get("b"), Err(AtlasError::NotFound)));
}

#[test]
fn test_close_keeps_prior_state_of_overwritten_ids() {
    let (_temp, _path, store) = setup_temp_store();
    store.set(DocInfo::new("a"), Document::new("a", "old")).unwrap();
    store.set(DocInfo::new("b"), Document::new("b", "kept")).unwrap();
    store.commit().unwrap();

    let bulk = store.bulk().unwrap();
    bulk.set(DocInfo::new("a"), Document::new("a", "new")).unwrap();
    bulk.delete(DocInfo::tombstone("b")).unwrap();
    bulk.close();

    let (doc, info) = store.get("a").unwrap();
    assert_eq!(doc.value_str(), "old");
    assert_eq!(info.rev_seq(), 1);
    assert_eq!(store.get("b").unwrap().0.value_str(), "kept");
    assert_eq!(store.info().unwrap().last_sequence, 2);
}

#[test]
fn test_drop_discards_uncommitted() {
    let (_temp, _path, store) = setup_temp_store();
    {
        let bulk = store.bulk().unwrap();
        bulk.set(DocInfo::new("a"), Document::new("a", "1")).unwrap();
    }

    assert!(matches!(store.get("a"), Err(AtlasError::NotFound)));
    store.commit().unwrap();
    assert!(matches!(store.get("a"), Err(AtlasError::NotFound)));
}

#[test]
fn test_producer_after_close_fails() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();
    let producer = bulk.producer();

    bulk.close();

    let result = producer.set(DocInfo::new("a"), Document::new("a", "1"));
    assert!(matches!(result, Err(AtlasError::Closed)));
    assert!(matches!(
        producer.delete(DocInfo::tombstone("a")),
        Err(AtlasError::Closed)
    ));
}

#[test]
fn test_commit_after_store_closed() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();
    bulk.set(DocInfo::new("a"), Document::new("a", "1")).unwrap();

    store.close();

    assert!(matches!(bulk.commit(), Err(AtlasError::Closed)));
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failed_apply_skips_commit_and_clears_batch() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::for_path(temp_dir.path().join("flaky.atlasdoc"), true);
    let fail_apply = Arc::new(AtomicBool::new(true));
    let commits = Arc::new(AtomicUsize::new(0));
    let engine = FlakyEngine {
        inner: FileEngine::open(&config).unwrap(),
        fail_apply: Arc::clone(&fail_apply),
        commits: Arc::clone(&commits),
    };
    let store = Store::from_engine(engine, config);
    let bulk = store.bulk().unwrap();

    bulk.set(DocInfo::new("lost"), Document::new("lost", "1")).unwrap();
    assert!(matches!(bulk.commit(), Err(AtlasError::Engine(_))));
    assert_eq!(commits.load(Ordering::SeqCst), 0);

    fail_apply.store(false, Ordering::SeqCst);
    bulk.set(DocInfo::new("kept"), Document::new("kept", "2")).unwrap();
    bulk.commit().unwrap();
    assert_eq!(commits.load(Ordering::SeqCst), 1);

    let docs = live_docs(&store);
    assert_eq!(docs.keys().collect::<Vec<_>>(), vec!["kept"]);
}

#[test]
fn test_exhausted_rev_seq_fails_commit_not_writer() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    bulk.set(DocInfo::new("a").with_rev_seq(u64::MAX), Document::new("a", "1"))
        .unwrap();
    bulk.commit().unwrap();

    bulk.set(DocInfo::new("a"), Document::new("a", "2")).unwrap();
    assert!(matches!(bulk.commit(), Err(AtlasError::InvalidArgument(_))));

    // The coordinator survives and the failed batch is gone
    bulk.set(DocInfo::new("b"), Document::new("b", "3")).unwrap();
    bulk.commit().unwrap();
    assert_eq!(store.get("a").unwrap().0.value_str(), "1");
    assert_eq!(store.get("b").unwrap().0.value_str(), "3");
}

#[test]
fn test_invalid_instruction_fails_whole_batch() {
    let (_temp, _path, store) = setup_temp_store();
    let bulk = store.bulk().unwrap();

    bulk.set(DocInfo::new("good"), Document::new("good", "1")).unwrap();
    bulk.set(DocInfo::new(""), Document::new("", "1")).unwrap();

    assert!(matches!(bulk.commit(), Err(AtlasError::InvalidArgument(_))));
    assert!(matches!(store.get("good"), Err(AtlasError::NotFound)));

    bulk.commit().unwrap();
    assert!(matches!(store.get("good"), Err(AtlasError::NotFound)));
}
