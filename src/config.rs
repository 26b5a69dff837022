//! Configuration for AtlasDoc
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{AtlasError, Result};

/// Configuration for opening a store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single store file
    pub path: PathBuf,

    /// Create the file if it does not exist
    pub create_if_missing: bool,

    /// When to fsync after a commit
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Bulk Writer Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the bulk writer request queue.
    /// 0 makes every enqueue a rendezvous with the coordinator.
    pub bulk_queue_capacity: usize,

    /// Initial capacity reserved for each pending batch
    pub bulk_batch_capacity: usize,
}

/// Commit sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every commit (safest, slowest)
    EveryCommit,

    /// fsync after N commits (balanced durability/performance)
    EveryNCommits { count: usize },

    /// Never fsync; leave it to the OS (tests, scratch stores)
    Never,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./atlasdoc.db"),
            create_if_missing: true,
            sync_strategy: SyncStrategy::EveryCommit,
            bulk_queue_capacity: 1024,
            bulk_batch_capacity: 100,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Config for `path` with every other setting at its default
    pub fn for_path(path: impl Into<PathBuf>, create_if_missing: bool) -> Self {
        Self {
            path: path.into(),
            create_if_missing,
            ..Self::default()
        }
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AtlasError::Config("store path is empty".to_string()));
        }
        if let SyncStrategy::EveryNCommits { count: 0 } = self.sync_strategy {
            return Err(AtlasError::Config(
                "EveryNCommits requires count > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the store file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Create the file when missing
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the commit sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the bulk writer queue capacity
    pub fn bulk_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.bulk_queue_capacity = capacity;
        self
    }

    /// Set the initial capacity of each bulk batch
    pub fn bulk_batch_capacity(mut self, capacity: usize) -> Self {
        self.config.bulk_batch_capacity = capacity;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
