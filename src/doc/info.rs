//! DocInfo
//!
//! Index-level metadata for one document.

use std::borrow::Cow;
use std::ops::BitOr;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::lease::Lease;

/// Content flags attached to a document. Stored and returned verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentMeta(u8);

impl ContentMeta {
    /// Body is valid JSON
    pub const JSON: Self = Self(0);
    /// Body failed JSON validation
    pub const INVALID_JSON: Self = Self(1);
    /// Body is JSON with an invalid key
    pub const INVALID_JSON_KEY: Self = Self(2);
    /// Body was never checked for JSON
    pub const NON_JSON: Self = Self(3);
    /// Body was compressed by the writer
    pub const IS_COMPRESSED: Self = Self(0x80);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_compressed(self) -> bool {
        self.contains(Self::IS_COMPRESSED)
    }
}

impl From<u8> for ContentMeta {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl BitOr for ContentMeta {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Location of a document body inside the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyRef {
    /// Offset of the body frame
    pub offset: u64,
    /// Body length in bytes (0 = no body)
    pub len: u32,
}

/// Index metadata for a document
///
/// Caller-built for writes with [`DocInfo::new`]; engine-built for reads, in
/// which case it carries a lease released when the last clone drops.
#[derive(Debug, Clone)]
pub struct DocInfo {
    id: Bytes,
    sequence: u64,
    rev_seq: u64,
    deleted: bool,
    content_meta: ContentMeta,
    rev_meta: Bytes,
    body: BodyRef,
    lease: Option<Arc<Lease>>,
}

impl DocInfo {
    /// New metadata for `id`; sequence 0, not deleted, `ContentMeta::JSON`
    pub fn new(id: impl AsRef<[u8]>) -> Self {
        Self {
            id: Bytes::copy_from_slice(id.as_ref()),
            sequence: 0,
            rev_seq: 0,
            deleted: false,
            content_meta: ContentMeta::JSON,
            rev_meta: Bytes::new(),
            body: BodyRef::default(),
            lease: None,
        }
    }

    /// Metadata for a deletion of `id`
    pub fn tombstone(id: impl AsRef<[u8]>) -> Self {
        let mut info = Self::new(id);
        info.deleted = true;
        info
    }

    /// Set the content flags
    pub fn with_content_meta(mut self, content_meta: impl Into<ContentMeta>) -> Self {
        self.content_meta = content_meta.into();
        self
    }

    /// Set the revision counter (0 lets the engine assign the next one)
    pub fn with_rev_seq(mut self, rev_seq: u64) -> Self {
        self.rev_seq = rev_seq;
        self
    }

    /// Attach opaque revision metadata
    pub fn with_rev_meta(mut self, rev_meta: impl AsRef<[u8]>) -> Self {
        self.rev_meta = Bytes::copy_from_slice(rev_meta.as_ref());
        self
    }

    /// Mark (or unmark) this record as a deletion
    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Builder form of [`DocInfo::set_deleted`]`(true)`
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.id)
    }

    /// Commit-order sequence; 0 until committed
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rev_seq(&self) -> u64 {
        self.rev_seq
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn content_meta(&self) -> ContentMeta {
        self.content_meta
    }

    pub fn rev_meta(&self) -> &[u8] {
        &self.rev_meta
    }

    /// Stored body size in bytes
    pub fn size(&self) -> u32 {
        self.body.len
    }

    /// True if this value was issued by the engine
    pub fn is_engine_owned(&self) -> bool {
        self.lease.is_some()
    }

    // =========================================================================
    // Engine-side
    // =========================================================================

    pub(crate) fn id_bytes(&self) -> &Bytes {
        &self.id
    }

    pub(crate) fn body(&self) -> BodyRef {
        self.body
    }

    /// Rebuild committed metadata read back from the index
    pub(crate) fn from_parts(
        id: Bytes,
        sequence: u64,
        rev_seq: u64,
        deleted: bool,
        content_meta: ContentMeta,
        rev_meta: Bytes,
        body: BodyRef,
    ) -> Self {
        Self {
            id,
            sequence,
            rev_seq,
            deleted,
            content_meta,
            rev_meta,
            body,
            lease: None,
        }
    }

    pub(crate) fn with_lease(mut self, lease: Lease) -> Self {
        self.lease = Some(Arc::new(lease));
        self
    }
}
