//! Walk Module
//!
//! Push-style, ascending-key traversal of the committed index.
//!
//! ## Protocol
//! ```text
//! Idle ──walk()──► Iterating ──┬── no more keys ─────► Exhausted
//!                              ├── visitor: Stop ────► Stopped
//!                              └── visitor: Fail(e) ─► Failed(e)
//!                                  or engine error
//! ```
//!
//! - Keys are visited once each, in strictly ascending byte order
//! - `Stop` is carried through the engine as `AtlasError::Cancelled` and
//!   comes back out as `WalkOutcome::Stopped`, never as an error. A visitor
//!   failing with `Cancelled` is a stop as well.
//! - Whether writes committed during a walk are seen is unspecified

use bytes::Bytes;

use crate::doc::{DocInfo, Document};
use crate::engine::{DbInfo, StorageEngine};
use crate::error::{AtlasError, Result};
use crate::store::{self, Store};

/// What a visitor tells the walk to do next
#[derive(Debug)]
pub enum WalkSignal {
    /// Proceed to the next entry
    Continue,
    /// End the walk successfully
    Stop,
    /// End the walk and return this error from `walk`.
    /// `Fail(AtlasError::Cancelled)` behaves like `Stop`.
    Fail(AtlasError),
}

/// How a successful walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every entry from the start key was visited
    Exhausted,
    /// The visitor returned `Stop`
    Stopped,
}

/// Read access to the store from inside a visitor
///
/// Visitors must read through this handle; calling back into the `Store`
/// for writes while a walk is running is not supported.
pub struct WalkHandle<'a, E: StorageEngine> {
    engine: &'a E,
}

impl<'a, E: StorageEngine> WalkHandle<'a, E> {
    /// Committed document and metadata for `id`
    pub fn get(&self, id: impl AsRef<[u8]>) -> Result<(Document, DocInfo)> {
        store::fetch(self.engine, id.as_ref())
    }

    /// Materialize the body for metadata seen during the walk
    pub fn open_body(&self, info: &DocInfo) -> Result<Document> {
        self.engine.open_body(info)
    }

    pub fn info(&self) -> Result<DbInfo> {
        self.engine.info()
    }
}

impl<E: StorageEngine> Store<E> {
    /// Visit index entries with key >= `start_key` (empty = from the start).
    ///
    /// Deleted entries are visited too; check `DocInfo::is_deleted`.
    pub fn walk<F>(&self, start_key: impl AsRef<[u8]>, visit: F) -> Result<WalkOutcome>
    where
        F: FnMut(&WalkHandle<'_, E>, &DocInfo) -> WalkSignal,
    {
        let engine = self.shared.read()?;
        drive(&*engine, start_key.as_ref(), visit)
    }

    /// Like `walk`, but also hands the visitor each document body.
    ///
    /// Unlike `walk`, deleted entries are never passed to the visitor, so it
    /// needs no `is_deleted` check of its own. Failing to read a body ends
    /// the walk with that error.
    pub fn walk_docs<F>(&self, start_key: impl AsRef<[u8]>, mut visit: F) -> Result<WalkOutcome>
    where
        F: FnMut(&WalkHandle<'_, E>, &DocInfo, &Document) -> WalkSignal,
    {
        self.walk(start_key, |handle, info| {
            if info.is_deleted() {
                return WalkSignal::Continue;
            }
            match handle.open_body(info) {
                Ok(doc) => visit(handle, info, &doc),
                Err(err) => WalkSignal::Fail(err),
            }
        })
    }
}

/// Run one walk against an engine
fn drive<E, F>(engine: &E, start: &[u8], mut visit: F) -> Result<WalkOutcome>
where
    E: StorageEngine,
    F: FnMut(&WalkHandle<'_, E>, &DocInfo) -> WalkSignal,
{
    let handle = WalkHandle { engine };
    let mut visited: u64 = 0;
    let mut last_key: Option<Bytes> = None;

    let result = engine.iterate_from(start, &mut |info: DocInfo| {
        if let Some(last) = &last_key {
            if info.id() <= last.as_ref() {
                return Err(AtlasError::Corruption(format!(
                    "walk out of order: {:?} after {:?}",
                    info.id_str(),
                    String::from_utf8_lossy(last)
                )));
            }
        }
        last_key = Some(Bytes::copy_from_slice(info.id()));
        visited += 1;

        tracing::trace!(key = %info.id_str(), seq = info.sequence(), "walk visit");
        match visit(&handle, &info) {
            WalkSignal::Continue => Ok(()),
            WalkSignal::Stop => Err(AtlasError::Cancelled),
            WalkSignal::Fail(err) => Err(err),
        }
    });

    match result {
        Ok(()) => {
            tracing::trace!(visited, "walk exhausted");
            Ok(WalkOutcome::Exhausted)
        }
        Err(AtlasError::Cancelled) => {
            tracing::trace!(visited, "walk stopped by visitor");
            Ok(WalkOutcome::Stopped)
        }
        Err(err) => Err(err),
    }
}
