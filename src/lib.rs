//! # AtlasDoc
//!
//! An embedded, file-backed document store with:
//! - Append-only storage with checksummed frames and crash recovery
//! - Leased read handles, released exactly once
//! - Cancellable ascending-key walks
//! - A single-coordinator bulk writer batching concurrent producers into
//!   one commit
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Callers / Bulk producers (many threads)          │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │ get/set/delete/commit/walk  │ set/delete/commit
//!                 │                             ▼
//!                 │                    ┌─────────────────┐
//!                 │                    │   BulkWriter    │
//!                 │                    │ (1 coordinator) │
//!                 │                    └────────┬────────┘
//!                 ▼                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │          (RwLock: shared reads / exclusive writes)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       ▼
//!              ┌──────────────────┐        ┌────────────────┐
//!              │  StorageEngine   │───────►│ HandleRegistry │
//!              │  (FileEngine)    │ leases │                │
//!              └──────────────────┘        └────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod doc;
pub mod engine;
pub mod store;
pub mod walk;
pub mod bulk;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::{StoreConfig, SyncStrategy};
pub use doc::{ContentMeta, DocInfo, Document};
pub use engine::{DbInfo, FileEngine, StorageEngine};
pub use store::Store;
pub use walk::{WalkHandle, WalkOutcome, WalkSignal};
pub use bulk::{BulkProducer, BulkWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDoc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
