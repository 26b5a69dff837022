//! Store Recovery
//!
//! Rebuilds the in-memory index by replaying Commit frames on open.
//!
//! This will:
//! 1. Validate the file header
//! 2. Replay every valid Commit frame in file order
//! 3. Stop at the first torn or checksum-failing frame
//! 4. Report where the last valid commit ends, so the caller can truncate
//!    uncommitted or damaged bytes after it
//!
//! A valid header followed by no commit is not an error here;
//! `commits_replayed == 0` tells the caller the file was never initialized.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use super::frame::{self, FrameKind, ScannedFrame, FILE_HEADER_SIZE};
use super::record::{CommitRecord, DbHeader, IndexRecord};
use crate::error::{AtlasError, Result};

/// Result of a recovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Commit frames replayed into the index
    pub commits_replayed: u64,

    /// Body frames seen (committed or not)
    pub bodies_scanned: u64,

    /// Bytes after the last valid commit that will be discarded
    pub bytes_truncated: u64,

    /// Last sequence number recovered
    pub last_sequence: u64,

    /// Offset of the last valid Commit frame
    pub header_position: u64,
}

/// State rebuilt from the file
pub(crate) struct RecoveredState {
    pub index: BTreeMap<Vec<u8>, IndexRecord>,
    pub header: DbHeader,
    pub header_position: u64,
    /// End of the last valid Commit frame
    pub valid_len: u64,
}

/// Scan a store file. The caller reports any error as an open failure.
pub(crate) fn scan(file: &File, file_len: u64) -> Result<(RecoveredState, RecoveryResult)> {
    if file_len < FILE_HEADER_SIZE {
        return Err(AtlasError::Corruption(format!(
            "File too short for header: {} bytes",
            file_len
        )));
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;

    let mut header_bytes = [0u8; FILE_HEADER_SIZE as usize];
    reader.read_exact(&mut header_bytes)?;
    frame::check_file_header(&header_bytes).map_err(AtlasError::Corruption)?;

    let mut state = RecoveredState {
        index: BTreeMap::new(),
        header: DbHeader::default(),
        header_position: 0,
        valid_len: FILE_HEADER_SIZE,
    };
    let mut result = RecoveryResult::default();
    let mut position = FILE_HEADER_SIZE;

    loop {
        let scanned = frame::read_frame(&mut reader, file_len - position)?;
        match scanned {
            ScannedFrame::End => break,
            ScannedFrame::Torn(reason) => {
                tracing::warn!(offset = position, "Stopping recovery at damaged frame: {}", reason);
                break;
            }
            ScannedFrame::Frame { kind, payload } => {
                let frame_start = position;
                position += frame::FRAME_HEADER_SIZE + payload.len() as u64;

                match kind {
                    FrameKind::Body => result.bodies_scanned += 1,
                    FrameKind::Commit => {
                        let commit = match CommitRecord::deserialize(&payload) {
                            Ok(c) => c,
                            Err(e) => {
                                // Checksum passed but the record is unreadable:
                                // treat it like a torn frame.
                                tracing::warn!(offset = frame_start, "Undecodable commit record: {}", e);
                                break;
                            }
                        };

                        for entry in commit.entries {
                            state.index.insert(entry.id.clone(), entry);
                        }
                        state.header = commit.header;
                        state.header_position = frame_start;
                        state.valid_len = position;
                        result.commits_replayed += 1;
                    }
                }
            }
        }
    }

    result.bytes_truncated = file_len - state.valid_len;
    result.last_sequence = state.header.update_seq;
    result.header_position = state.header_position;

    Ok((state, result))
}
