//! Engine Module
//!
//! The storage engine behind a `Store`, reached only through
//! [`StorageEngine`].
//!
//! ## Responsibilities
//! - Queue writes and make them durable on `commit`
//! - Point lookups by id and body materialization
//! - Ordered iteration from a start key
//! - Issue leases for every value handed out and take them back
//!
//! ## File Format (FileEngine)
//! ```text
//! ┌────────────────────────────────────────┐
//! │ File Header                            │
//! │ ┌──────────┬──────────┬─────────────┐  │
//! │ │Magic (4) │Version(2)│Reserved (2) │  │
//! │ └──────────┴──────────┴─────────────┘  │
//! ├────────────────────────────────────────┤
//! │ Frames (append-only)                   │
//! │ ┌────────┬────────┬────────┬────────┐  │
//! │ │Kind (1)│Len (4) │CRC (4) │Payload │  │
//! │ └────────┴────────┴────────┴────────┘  │
//! │  Body   (0x01): raw document body      │
//! │  Commit (0x02): header + index entries │
//! └────────────────────────────────────────┘
//! ```

mod file;
mod frame;
mod handles;
mod record;
mod recovery;

pub use file::FileEngine;
pub use handles::HandleRegistry;
pub use recovery::RecoveryResult;

use crate::doc::{DocInfo, Document};
use crate::error::Result;

/// Summary of a store, as of the last commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbInfo {
    /// Live (non-deleted) documents
    pub doc_count: u64,
    /// Deleted documents
    pub deleted_count: u64,
    /// Body bytes referenced by the index
    pub space_used: u64,
    /// File offset of the latest commit header
    pub header_position: u64,
    /// Highest committed sequence
    pub last_sequence: u64,
    /// Current file size
    pub file_size: u64,
}

/// The storage engine interface
///
/// ## Concurrency:
/// - `&mut self` methods (writes, commit, close) are exclusive
/// - `&self` methods (reads, iteration, info) may run concurrently with each
///   other, and a visitor may call `&self` methods during `iterate_from`
///
/// Values returned by reads carry leases issued by the engine.
pub trait StorageEngine: Send + Sync + 'static {
    /// Queue one write; durable after `commit`
    fn save(&mut self, info: DocInfo, doc: Document) -> Result<()>;

    /// Queue a whole batch; either every instruction is accepted or none
    fn apply_batch(&mut self, batch: Vec<(DocInfo, Document)>) -> Result<()>;

    /// Make queued writes durable, assigning sequences in write order
    fn commit(&mut self) -> Result<()>;

    /// Committed metadata for `id` (including deleted entries)
    fn lookup_by_id(&self, id: &[u8]) -> Result<DocInfo>;

    /// Materialize the body described by `info`
    fn open_body(&self, info: &DocInfo) -> Result<Document>;

    /// Visit committed entries with key >= `start` in ascending order.
    ///
    /// The first error returned by `visitor` stops iteration and is returned
    /// as is; `AtlasError::Cancelled` is the stop signal.
    fn iterate_from(
        &self,
        start: &[u8],
        visitor: &mut dyn FnMut(DocInfo) -> Result<()>,
    ) -> Result<()>;

    /// Read-only summary
    fn info(&self) -> Result<DbInfo>;

    /// Release the connection; later calls fail with `Closed`
    fn close(&mut self) -> Result<()>;

    /// Outstanding leases
    fn live_handles(&self) -> usize;
}
