//! Bulk Module
//!
//! Batched writes through a single coordinator thread.
//!
//! ## Architecture
//! ```text
//!  producer ─┐
//!  producer ─┼──► FIFO queue ──► coordinator thread ──► Store (apply + commit)
//!  writer   ─┘   (update / commit / close)   owns the pending batch
//! ```
//!
//! - The pending batch is only ever touched by the coordinator
//! - Requests are served strictly in the order they were accepted
//! - A commit hands the whole batch to the engine and starts a new one,
//!   whether or not the commit succeeds
//! - Closing discards whatever was never committed

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::doc::{DocInfo, Document};
use crate::engine::StorageEngine;
use crate::error::{AtlasError, Result};
use crate::store::{Store, StoreShared};

/// One queued write
struct Instruction {
    info: DocInfo,
    doc: Document,
}

/// Requests served by the coordinator, in arrival order
enum Request {
    Update(Instruction),
    Commit(Sender<Result<()>>),
    Close,
}

impl<E: StorageEngine> Store<E> {
    /// Start a bulk writer for this store
    ///
    /// The writer must be closed (or dropped) when done. Instructions not
    /// committed by then are discarded.
    pub fn bulk(&self) -> Result<BulkWriter> {
        let (tx, rx) = channel::bounded(self.shared.config().bulk_queue_capacity);
        let coordinator = Coordinator {
            shared: Arc::clone(&self.shared),
            requests: rx,
            batch_capacity: self.shared.config().bulk_batch_capacity,
        };

        let worker = thread::Builder::new()
            .name("atlasdoc-bulk".to_string())
            .spawn(move || coordinator.run())?;

        Ok(BulkWriter {
            tx,
            worker: Some(worker),
        })
    }
}

// =============================================================================
// Coordinator
// =============================================================================

struct Coordinator<E: StorageEngine> {
    shared: Arc<StoreShared<E>>,
    requests: Receiver<Request>,
    batch_capacity: usize,
}

impl<E: StorageEngine> Coordinator<E> {
    fn run(self) {
        let mut pending: Vec<(DocInfo, Document)> = Vec::with_capacity(self.batch_capacity);

        loop {
            match self.requests.recv() {
                Ok(Request::Update(Instruction { info, doc })) => {
                    pending.push((info, doc));
                }
                Ok(Request::Commit(reply)) => {
                    let batch = std::mem::replace(&mut pending, Vec::with_capacity(self.batch_capacity));
                    let size = batch.len();
                    let result = self.shared.commit_batch(batch);
                    if let Err(e) = &result {
                        tracing::warn!("Bulk commit of {} instructions failed: {}", size, e);
                    }
                    // The committer may have given up waiting; nothing to do then.
                    let _ = reply.send(result);
                }
                Ok(Request::Close) => break,
                Err(_) => {
                    // Every sender is gone.
                    break;
                }
            }
        }

        if !pending.is_empty() {
            tracing::warn!(
                "Bulk writer closed with {} uncommitted instructions; discarding",
                pending.len()
            );
        }
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Bulk writer handle
///
/// `set`/`delete`/`commit` take `&self`, so one writer can be shared by
/// scoped producer threads. Use [`BulkWriter::producer`] for producers that
/// need an owned handle.
pub struct BulkWriter {
    tx: Sender<Request>,
    worker: Option<JoinHandle<()>>,
}

impl BulkWriter {
    /// Queue a write. Does not touch the engine.
    pub fn set(&self, info: DocInfo, doc: Document) -> Result<()> {
        enqueue(&self.tx, Instruction { info, doc })
    }

    /// Queue a deletion.
    ///
    /// `info` must already be marked deleted (`DocInfo::tombstone`,
    /// `DocInfo::deleted` or `set_deleted(true)`); unmarked metadata is
    /// rejected with `InvalidArgument`.
    pub fn delete(&self, info: DocInfo) -> Result<()> {
        enqueue(&self.tx, deletion(info)?)
    }

    /// Apply everything queued so far as one batch and commit it.
    ///
    /// Blocks until the engine has answered. The batch is gone afterwards
    /// either way; failed instructions are not retried.
    pub fn commit(&self) -> Result<()> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.tx
            .send(Request::Commit(reply_tx))
            .map_err(|_| AtlasError::Closed)?;
        reply_rx.recv().map_err(|_| AtlasError::Closed)?
    }

    /// Owned, cloneable enqueue-only handle
    pub fn producer(&self) -> BulkProducer {
        BulkProducer {
            tx: self.tx.clone(),
        }
    }

    /// Stop the coordinator. Uncommitted instructions are discarded.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            // Fails only if the coordinator already exited.
            let _ = self.tx.send(Request::Close);
            if worker.join().is_err() {
                tracing::error!("Bulk coordinator thread panicked");
            }
        }
    }
}

impl Drop for BulkWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Enqueue-only handle to a bulk writer
///
/// Once the writer is closed, every call returns `AtlasError::Closed`.
#[derive(Clone)]
pub struct BulkProducer {
    tx: Sender<Request>,
}

impl BulkProducer {
    /// Queue a write
    pub fn set(&self, info: DocInfo, doc: Document) -> Result<()> {
        enqueue(&self.tx, Instruction { info, doc })
    }

    /// Queue a deletion; same contract as [`BulkWriter::delete`]
    pub fn delete(&self, info: DocInfo) -> Result<()> {
        enqueue(&self.tx, deletion(info)?)
    }
}

fn enqueue(tx: &Sender<Request>, instruction: Instruction) -> Result<()> {
    tx.send(Request::Update(instruction))
        .map_err(|_| AtlasError::Closed)
}

fn deletion(info: DocInfo) -> Result<Instruction> {
    if !info.is_deleted() {
        return Err(AtlasError::InvalidArgument(format!(
            "bulk delete of {:?} requires metadata marked deleted",
            info.id_str()
        )));
    }
    let doc = Document::empty(info.id());
    Ok(Instruction { info, doc })
}
