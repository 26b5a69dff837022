//! Document Module
//!
//! Value types crossing the engine boundary.
//!
//! ## Ownership
//! - Caller-built values (`Document::new`, `DocInfo::new`) own plain buffers
//!   and need no release.
//! - Engine-built values (reads, walk entries) hold an `Arc<Lease>`.
//!   Clones share the lease; dropping the last clone releases the handle
//!   back to the engine exactly once.
//! - Passing a value to `set` moves it into the engine.

mod document;
mod info;
mod lease;

pub use document::Document;
pub use info::{BodyRef, ContentMeta, DocInfo};
pub use lease::{HandleId, HandleKind, Lease, Release};
