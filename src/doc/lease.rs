//! Engine handle leases
//!
//! A lease is the proof that a value was issued by the engine and still has
//! to be given back. Dropping the lease is the only way to release it, so
//! each lease is released exactly once.

use std::fmt;
use std::sync::Arc;

/// Identifier of one engine-issued handle
pub type HandleId = u64;

/// What an engine-issued handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Index metadata (`DocInfo`)
    Info,
    /// Materialized body (`Document`)
    Doc,
}

/// The releasing side of a lease (the engine's handle table)
pub trait Release: Send + Sync {
    /// Give back a handle. Called exactly once per issued handle.
    fn release(&self, id: HandleId, kind: HandleKind);
}

/// Owning token for one engine-issued handle
///
/// Values share a lease through `Arc<Lease>`; the last clone to drop
/// triggers the release.
pub struct Lease {
    id: HandleId,
    kind: HandleKind,
    owner: Arc<dyn Release>,
}

impl Lease {
    pub(crate) fn new(id: HandleId, kind: HandleKind, owner: Arc<dyn Release>) -> Self {
        Self { id, kind, owner }
    }

    /// Handle id assigned by the engine
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Kind of the leased handle
    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.owner.release(self.id, self.kind);
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
