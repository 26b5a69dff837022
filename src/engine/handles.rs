//! Handle Registry
//!
//! Tracks every `DocInfo`/`Document` the engine hands out until its lease
//! comes back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::doc::{HandleId, HandleKind, Lease, Release};

/// Table of outstanding engine handles
///
/// ## Concurrency:
/// - `live`: Mutex-protected map, touched once on issue and once on release
/// - counters are atomic
/// - leases keep the registry alive, so releases after the engine closed
///   still land here
#[derive(Default)]
pub struct HandleRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<HandleId, HandleKind>>,
    issued: AtomicU64,
    released: AtomicU64,
}

impl HandleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Issue a new lease of the given kind
    pub fn issue(self: &Arc<Self>, kind: HandleKind) -> Lease {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id, kind);
        self.issued.fetch_add(1, Ordering::Relaxed);

        let owner: Arc<dyn Release> = Arc::clone(self) as Arc<dyn Release>;
        Lease::new(id, kind, owner)
    }

    /// Number of handles issued but not yet released
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Total handles ever issued
    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Total handles released
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn free_info(&self, id: HandleId) {
        self.free(id, HandleKind::Info);
    }

    fn free_doc(&self, id: HandleId) {
        self.free(id, HandleKind::Doc);
    }

    fn free(&self, id: HandleId, kind: HandleKind) {
        match self.live.lock().remove(&id) {
            Some(issued_as) if issued_as == kind => {
                self.released.fetch_add(1, Ordering::Relaxed);
            }
            Some(issued_as) => {
                // Still counts as released; the kind tag is only bookkeeping.
                self.released.fetch_add(1, Ordering::Relaxed);
                tracing::error!(id, ?issued_as, ?kind, "handle released with wrong kind");
            }
            None => {
                tracing::error!(id, ?kind, "release of unknown or already released handle");
            }
        }
    }
}

impl Release for HandleRegistry {
    fn release(&self, id: HandleId, kind: HandleKind) {
        match kind {
            HandleKind::Info => self.free_info(id),
            HandleKind::Doc => self.free_doc(id),
        }
    }
}
