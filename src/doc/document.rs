//! Document
//!
//! A record's id and body.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;

use super::lease::Lease;

/// Document content
///
/// Immutable once built. A document returned by a read carries a lease that
/// is released when the last clone drops.
#[derive(Debug, Clone)]
pub struct Document {
    id: Bytes,
    value: Bytes,
    lease: Option<Arc<Lease>>,
}

impl Document {
    /// New caller-owned document
    pub fn new(id: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        Self {
            id: Bytes::copy_from_slice(id.as_ref()),
            value: Bytes::copy_from_slice(value.as_ref()),
            lease: None,
        }
    }

    /// Document with an empty body, used for deletions
    pub fn empty(id: impl AsRef<[u8]>) -> Self {
        Self::new(id, Bytes::new())
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.id)
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// Cheap clone of the body buffer
    pub fn value_bytes(&self) -> Bytes {
        self.value.clone()
    }

    /// True if this value was issued by the engine
    pub fn is_engine_owned(&self) -> bool {
        self.lease.is_some()
    }

    pub(crate) fn from_engine(id: Bytes, value: Bytes, lease: Lease) -> Self {
        Self {
            id,
            value,
            lease: Some(Arc::new(lease)),
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.value == other.value
    }
}

impl Eq for Document {}
