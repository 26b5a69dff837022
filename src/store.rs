//! Store Module
//!
//! The store handle: one open connection to one storage file.
//!
//! ## Responsibilities
//! - Own the engine connection and close it exactly once
//! - Direct reads and writes (`get`/`set`/`delete`/`commit`/`info`)
//! - Entry point for walks (see `walk`) and bulk writers (see `bulk`)

use std::path::Path;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::StoreConfig;
use crate::doc::{DocInfo, Document};
use crate::engine::{DbInfo, FileEngine, StorageEngine};
use crate::error::{AtlasError, Result};

/// State shared between a store and its bulk writers
pub(crate) struct StoreShared<E: StorageEngine> {
    /// `None` once closed
    engine: RwLock<Option<E>>,
    config: StoreConfig,
}

impl<E: StorageEngine> StoreShared<E> {
    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Shared access to the open engine
    pub(crate) fn read(&self) -> Result<MappedRwLockReadGuard<'_, E>> {
        RwLockReadGuard::try_map(self.engine.read(), |engine| engine.as_ref())
            .map_err(|_| AtlasError::Closed)
    }

    /// Exclusive access to the open engine
    pub(crate) fn write(&self) -> Result<MappedRwLockWriteGuard<'_, E>> {
        RwLockWriteGuard::try_map(self.engine.write(), |engine| engine.as_mut())
            .map_err(|_| AtlasError::Closed)
    }

    /// Hand a batch to the engine and make it durable.
    ///
    /// A failed apply skips the commit and returns the apply error.
    pub(crate) fn commit_batch(&self, batch: Vec<(DocInfo, Document)>) -> Result<()> {
        let count = batch.len();
        let mut engine = self.write()?;
        engine.apply_batch(batch)?;
        engine.commit()?;
        tracing::debug!("Bulk batch of {} instructions committed", count);
        Ok(())
    }

    fn close(&self) {
        let engine = self.engine.write().take();
        if let Some(mut engine) = engine {
            if let Err(e) = engine.close() {
                tracing::warn!("Error closing {}: {}", self.config.path.display(), e);
            }
            tracing::info!("Closed store {}", self.config.path.display());
        }
    }
}

/// Handle to an open store
///
/// ## Concurrency Model
/// - Reads (`get`, `info`, walks) share the engine
/// - Writes (`set`, `delete`, `commit`, bulk commits) take it exclusively
/// - Ordering between direct writes and a bulk writer on the same store is
///   not arbitrated; use one writer per store
pub struct Store<E: StorageEngine = FileEngine> {
    pub(crate) shared: Arc<StoreShared<E>>,
}

impl Store<FileEngine> {
    /// Open a store file
    ///
    /// Fails with `AtlasError::Open` if the file is missing and
    /// `create_if_missing` is false, or on any format/I/O error.
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self> {
        Self::open_with(StoreConfig::for_path(path.as_ref(), create_if_missing))
    }

    /// Open a store with a full configuration
    pub fn open_with(config: StoreConfig) -> Result<Self> {
        let engine = FileEngine::open(&config)?;
        Ok(Self::from_engine(engine, config))
    }
}

impl<E: StorageEngine> Store<E> {
    /// Wrap an already open engine
    pub fn from_engine(engine: E, config: StoreConfig) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                engine: RwLock::new(Some(engine)),
                config,
            }),
        }
    }

    /// Close the store. Idempotent; errors are logged, not returned.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_open(&self) -> bool {
        self.shared.engine.read().is_some()
    }

    pub fn config(&self) -> &StoreConfig {
        self.shared.config()
    }

    /// Queue a write keyed by `info.id`. Deletions must arrive with
    /// `info` already marked deleted.
    pub fn set(&self, info: DocInfo, doc: Document) -> Result<()> {
        self.shared.write()?.save(info, doc)
    }

    /// Fetch the committed document and metadata for `id`
    ///
    /// Steps:
    /// 1. Resolve the index metadata
    /// 2. Reject deleted entries
    /// 3. Materialize the body from the metadata
    pub fn get(&self, id: impl AsRef<[u8]>) -> Result<(Document, DocInfo)> {
        let engine = self.shared.read()?;
        fetch(&*engine, id.as_ref())
    }

    /// Queue a deletion of `id`
    pub fn delete(&self, id: impl AsRef<[u8]>) -> Result<()> {
        let id = id.as_ref();
        self.set(DocInfo::tombstone(id), Document::empty(id))
    }

    /// Durably commit every queued write
    pub fn commit(&self) -> Result<()> {
        self.shared.write()?.commit()
    }

    /// Counts and positions as of the last commit
    pub fn info(&self) -> Result<DbInfo> {
        self.shared.read()?.info()
    }

    /// Engine handles issued and not yet released
    pub fn live_handles(&self) -> Result<usize> {
        Ok(self.shared.read()?.live_handles())
    }
}

impl<E: StorageEngine> Drop for Store<E> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Two-step read shared by `Store::get` and walk handles
pub(crate) fn fetch<E: StorageEngine>(engine: &E, id: &[u8]) -> Result<(Document, DocInfo)> {
    let info = engine.lookup_by_id(id)?;
    if info.is_deleted() {
        return Err(AtlasError::NotFound);
    }
    let doc = engine.open_body(&info)?;
    Ok((doc, info))
}
