//! Commit records
//!
//! The payload of a Commit frame: the new database header plus the index
//! entries written by that commit.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::doc::{BodyRef, ContentMeta, DocInfo};
use crate::error::Result;

/// Database header, rewritten by every commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DbHeader {
    /// Highest sequence assigned so far
    pub update_seq: u64,
    /// Live (non-deleted) documents
    pub doc_count: u64,
    /// Deleted documents (tombstones)
    pub deleted_count: u64,
    /// Body bytes referenced by the index
    pub space_used: u64,
    /// Offset of the previous Commit frame (0 for the first)
    pub prev_header: u64,
}

/// One committed index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IndexRecord {
    pub id: Vec<u8>,
    pub sequence: u64,
    pub rev_seq: u64,
    pub deleted: bool,
    pub content_meta: u8,
    pub rev_meta: Vec<u8>,
    pub body_offset: u64,
    pub body_len: u32,
}

impl IndexRecord {
    /// Build metadata for a read (lease attached by the caller)
    pub fn to_doc_info(&self) -> DocInfo {
        DocInfo::from_parts(
            Bytes::copy_from_slice(&self.id),
            self.sequence,
            self.rev_seq,
            self.deleted,
            ContentMeta::from_bits(self.content_meta),
            Bytes::copy_from_slice(&self.rev_meta),
            BodyRef {
                offset: self.body_offset,
                len: self.body_len,
            },
        )
    }
}

/// Payload of a Commit frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CommitRecord {
    pub header: DbHeader,
    pub entries: Vec<IndexRecord>,
}

impl CommitRecord {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
