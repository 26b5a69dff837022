//! Frame codec
//!
//! Length-prefixed, CRC-protected frames appended to the store file.

use std::io::{self, Read};

use crate::error::{AtlasError, Result};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an AtlasDoc store file
pub(crate) const MAGIC: &[u8; 4] = b"ATDC";

/// Current file format version
pub(crate) const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2) + Reserved (2) = 8 bytes
pub(crate) const FILE_HEADER_SIZE: u64 = 8;

/// Frame header size: Kind (1) + Len (4) + CRC (4) = 9 bytes
pub(crate) const FRAME_HEADER_SIZE: u64 = 9;

/// Largest payload a frame may carry (1 GiB)
pub(crate) const MAX_FRAME_LEN: u32 = 1 << 30;

/// Frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum FrameKind {
    Body = 0x01,
    Commit = 0x02,
}

impl FrameKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FrameKind::Body),
            0x02 => Some(FrameKind::Commit),
            _ => None,
        }
    }
}

// =============================================================================
// File Header
// =============================================================================

pub(crate) fn encode_file_header() -> [u8; FILE_HEADER_SIZE as usize] {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Validate magic and version; the error text is the reason
pub(crate) fn check_file_header(header: &[u8; FILE_HEADER_SIZE as usize]) -> std::result::Result<(), String> {
    if &header[0..4] != MAGIC {
        return Err(format!(
            "Invalid store magic: expected ATDC, got {:?}",
            &header[0..4]
        ));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(format!("Unsupported store version: {}", version));
    }
    Ok(())
}

// =============================================================================
// Frames
// =============================================================================

/// Append a frame to `buf`, returning the frame's total size
pub(crate) fn encode_frame(buf: &mut Vec<u8>, kind: FrameKind, payload: &[u8]) -> u64 {
    let crc = crc32fast::hash(payload);
    buf.push(kind as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(payload);
    FRAME_HEADER_SIZE + payload.len() as u64
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub kind: FrameKind,
    pub len: u32,
    pub crc: u32,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8; FRAME_HEADER_SIZE as usize]) -> std::result::Result<Self, String> {
        let kind = FrameKind::from_byte(bytes[0])
            .ok_or_else(|| format!("Unknown frame kind 0x{:02x}", bytes[0]))?;
        let len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let crc = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        if len > MAX_FRAME_LEN {
            return Err(format!("Frame too large: {} bytes", len));
        }
        Ok(Self { kind, len, crc })
    }

    pub fn total_len(&self) -> u64 {
        FRAME_HEADER_SIZE + self.len as u64
    }

    pub fn verify(&self, payload: &[u8]) -> bool {
        crc32fast::hash(payload) == self.crc
    }
}

/// Result of reading one frame during a scan
#[derive(Debug)]
pub(crate) enum ScannedFrame {
    /// A complete, checksum-valid frame
    Frame { kind: FrameKind, payload: Vec<u8> },
    /// Clean end of file
    End,
    /// Partial or corrupted frame; everything from here on is discarded
    Torn(String),
}

/// Read the next frame. `remaining` is the number of bytes left in the file.
pub(crate) fn read_frame<R: Read>(reader: &mut R, remaining: u64) -> io::Result<ScannedFrame> {
    if remaining == 0 {
        return Ok(ScannedFrame::End);
    }
    if remaining < FRAME_HEADER_SIZE {
        return Ok(ScannedFrame::Torn(format!(
            "Partial frame header ({} bytes)",
            remaining
        )));
    }

    let mut header_bytes = [0u8; FRAME_HEADER_SIZE as usize];
    reader.read_exact(&mut header_bytes)?;

    let header = match FrameHeader::parse(&header_bytes) {
        Ok(h) => h,
        Err(reason) => return Ok(ScannedFrame::Torn(reason)),
    };

    if header.total_len() > remaining {
        return Ok(ScannedFrame::Torn(format!(
            "Partial frame payload: need {} bytes, have {}",
            header.len,
            remaining - FRAME_HEADER_SIZE
        )));
    }

    let mut payload = vec![0u8; header.len as usize];
    reader.read_exact(&mut payload)?;

    if !header.verify(&payload) {
        return Ok(ScannedFrame::Torn("Frame checksum mismatch".to_string()));
    }

    Ok(ScannedFrame::Frame {
        kind: header.kind,
        payload,
    })
}

/// Read and verify a frame expected at a known location
pub(crate) fn read_frame_at<R: Read>(reader: &mut R, expected: FrameKind, expected_len: u32) -> Result<Vec<u8>> {
    let mut header_bytes = [0u8; FRAME_HEADER_SIZE as usize];
    reader.read_exact(&mut header_bytes)?;

    let header = FrameHeader::parse(&header_bytes).map_err(AtlasError::Corruption)?;
    if header.kind != expected || header.len != expected_len {
        return Err(AtlasError::Corruption(format!(
            "Expected {:?} frame of {} bytes, found {:?} frame of {} bytes",
            expected, expected_len, header.kind, header.len
        )));
    }

    let mut payload = vec![0u8; header.len as usize];
    reader.read_exact(&mut payload)?;

    if !header.verify(&payload) {
        return Err(AtlasError::Corruption(
            "Body checksum mismatch".to_string(),
        ));
    }
    Ok(payload)
}
