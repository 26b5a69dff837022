//! File Engine
//!
//! Single-file, append-only implementation of [`StorageEngine`].

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::frame::{self, FrameKind, FILE_HEADER_SIZE, MAX_FRAME_LEN};
use super::handles::HandleRegistry;
use super::record::{CommitRecord, DbHeader, IndexRecord};
use super::recovery::{self, RecoveryResult};
use super::{DbInfo, StorageEngine};
use crate::config::{StoreConfig, SyncStrategy};
use crate::doc::{DocInfo, Document, HandleKind};
use crate::error::{AtlasError, Result};

/// Previous state of an id while a commit computes its counters
#[derive(Clone, Copy)]
struct PriorState {
    deleted: bool,
    body_len: u32,
    rev_seq: u64,
}

impl From<&IndexRecord> for PriorState {
    fn from(record: &IndexRecord) -> Self {
        Self {
            deleted: record.deleted,
            body_len: record.body_len,
            rev_seq: record.rev_seq,
        }
    }
}

/// Append-only file engine
///
/// ## Concurrency:
/// - `writer`: only touched through `&mut self` (save/commit/close)
/// - `reader`: Mutex-protected so `&self` reads can seek
/// - `index`: committed entries only; pending writes are invisible to reads
pub struct FileEngine {
    /// Path of the store file
    path: PathBuf,

    /// Append handle (positioned explicitly before each write)
    writer: File,

    /// Separate read handle so reads never move the append position
    reader: Mutex<File>,

    /// Logical end of file (next append offset)
    end: u64,

    /// Committed index, ordered by id
    index: BTreeMap<Vec<u8>, IndexRecord>,

    /// Header of the latest commit
    header: DbHeader,

    /// Offset of the latest Commit frame
    header_position: u64,

    /// Writes queued since the last commit, in write order
    pending: Vec<(DocInfo, Document)>,

    sync_strategy: SyncStrategy,
    commits_since_sync: usize,

    /// Lease table for everything handed out
    handles: Arc<HandleRegistry>,

    closed: bool,
}

impl FileEngine {
    /// Open or create the store file described by `config`
    ///
    /// On startup:
    /// 1. Check existence against `create_if_missing`
    /// 2. Replay commits from an existing file
    /// 3. Truncate anything after the last valid commit
    /// 4. Initialize the file if it is empty or holds no commit yet (only
    ///    with `create_if_missing`)
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let path = config.path.as_path();

        if !path.exists() && !config.create_if_missing {
            return Err(AtlasError::open(path, "file does not exist"));
        }

        let mut writer = OpenOptions::new()
            .read(true)
            .write(true)
            .create(config.create_if_missing)
            .open(path)
            .map_err(|e| AtlasError::open(path, e))?;

        let file_len = writer.metadata().map_err(|e| AtlasError::open(path, e))?.len();

        // A file with a valid header but no commit is an interrupted create.
        let recovered = if file_len == 0 {
            None
        } else {
            let (state, result) =
                recovery::scan(&writer, file_len).map_err(|e| AtlasError::open(path, e))?;
            (result.commits_replayed > 0).then_some((state, result))
        };

        let (index, header, header_position, end) = match recovered {
            Some((state, result)) => {
                Self::log_recovery(path, &result);
                if result.bytes_truncated > 0 {
                    writer
                        .set_len(state.valid_len)
                        .and_then(|_| writer.sync_all())
                        .map_err(|e| AtlasError::open(path, e))?;
                }
                (state.index, state.header, state.header_position, state.valid_len)
            }
            None => {
                if !config.create_if_missing {
                    let reason = if file_len == 0 {
                        "file is empty"
                    } else {
                        "no valid commit header found"
                    };
                    return Err(AtlasError::open(path, reason));
                }
                if file_len > 0 {
                    tracing::warn!(
                        "Re-initializing {}: {} bytes without a valid commit",
                        path.display(),
                        file_len
                    );
                }
                let (header_position, end) =
                    Self::initialize(&mut writer).map_err(|e| AtlasError::open(path, e))?;
                tracing::info!("Created store {}", path.display());
                (BTreeMap::new(), DbHeader::default(), header_position, end)
            }
        };

        let reader = File::open(path).map_err(|e| AtlasError::open(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            reader: Mutex::new(reader),
            end,
            index,
            header,
            header_position,
            pending: Vec::new(),
            sync_strategy: config.sync_strategy,
            commits_since_sync: 0,
            handles: HandleRegistry::new(),
            closed: false,
        })
    }

    /// Open with a path (convenience method)
    pub fn open_path(path: &Path, create_if_missing: bool) -> Result<Self> {
        Self::open(&StoreConfig::for_path(path, create_if_missing))
    }

    /// Write the file header and an empty initial commit over whatever
    /// the file held before
    fn initialize(file: &mut File) -> Result<(u64, u64)> {
        file.set_len(0)?;
        let mut buf = Vec::new();
        buf.extend_from_slice(&frame::encode_file_header());
        let payload = CommitRecord::default().serialize()?;
        let header_position = FILE_HEADER_SIZE;
        let size = frame::encode_frame(&mut buf, FrameKind::Commit, &payload);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        file.sync_all()?;
        Ok((header_position, header_position + size))
    }

    fn log_recovery(path: &Path, result: &RecoveryResult) {
        tracing::info!(
            "Opened store {}: {} commits replayed, last_seq={}",
            path.display(),
            result.commits_replayed,
            result.last_sequence
        );
        if result.bytes_truncated > 0 {
            tracing::warn!(
                "Discarding {} uncommitted or damaged bytes after offset {}",
                result.bytes_truncated,
                result.header_position
            );
        }
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of writes queued since the last commit
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The engine's lease table
    pub fn handles(&self) -> &Arc<HandleRegistry> {
        &self.handles
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(AtlasError::Closed);
        }
        Ok(())
    }

    fn validate(info: &DocInfo, doc: &Document) -> Result<()> {
        if info.id().is_empty() {
            return Err(AtlasError::InvalidArgument(
                "document id is empty".to_string(),
            ));
        }
        if doc.value().len() > MAX_FRAME_LEN as usize {
            return Err(AtlasError::InvalidArgument(format!(
                "document body too large: {} bytes",
                doc.value().len()
            )));
        }
        Ok(())
    }

    fn issue_info(&self, record: &IndexRecord) -> DocInfo {
        record
            .to_doc_info()
            .with_lease(self.handles.issue(HandleKind::Info))
    }

    fn should_sync(&mut self) -> bool {
        match self.sync_strategy {
            SyncStrategy::EveryCommit => true,
            SyncStrategy::Never => false,
            SyncStrategy::EveryNCommits { count } => {
                self.commits_since_sync += 1;
                if self.commits_since_sync >= count {
                    self.commits_since_sync = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Encode bodies and the commit record for `pending` into one buffer.
    /// Nothing in `self` changes until the buffer is on disk.
    fn encode_commit(&self, pending: &[(DocInfo, Document)]) -> Result<(Vec<u8>, CommitRecord, u64)> {
        let mut buf = Vec::new();
        let mut position = self.end;
        let mut header = self.header.clone();
        let mut entries = Vec::with_capacity(pending.len());
        let mut batch_state: HashMap<&[u8], PriorState> = HashMap::new();

        for (info, doc) in pending {
            let id = info.id();
            let prior = batch_state
                .get(id)
                .copied()
                .or_else(|| self.index.get(id).map(PriorState::from));

            if let Some(prior) = prior {
                if prior.deleted {
                    header.deleted_count = header.deleted_count.saturating_sub(1);
                } else {
                    header.doc_count = header.doc_count.saturating_sub(1);
                }
                header.space_used = header.space_used.saturating_sub(prior.body_len as u64);
            }

            let body = doc.value();
            let body_len = body.len() as u32;
            let body_offset = if body.is_empty() {
                0
            } else {
                let offset = position;
                position += frame::encode_frame(&mut buf, FrameKind::Body, body);
                offset
            };

            header.update_seq += 1;
            let rev_seq = match info.rev_seq() {
                0 => match prior {
                    Some(p) => p.rev_seq.checked_add(1).ok_or_else(|| {
                        AtlasError::InvalidArgument(format!(
                            "revision counter of {:?} is exhausted",
                            info.id_str()
                        ))
                    })?,
                    None => 1,
                },
                caller => caller,
            };

            if info.is_deleted() {
                header.deleted_count += 1;
            } else {
                header.doc_count += 1;
            }
            header.space_used += body_len as u64;

            batch_state.insert(
                id,
                PriorState {
                    deleted: info.is_deleted(),
                    body_len,
                    rev_seq,
                },
            );

            entries.push(IndexRecord {
                id: id.to_vec(),
                sequence: header.update_seq,
                rev_seq,
                deleted: info.is_deleted(),
                content_meta: info.content_meta().bits(),
                rev_meta: info.rev_meta().to_vec(),
                body_offset,
                body_len,
            });
        }

        header.prev_header = self.header_position;
        let record = CommitRecord { header, entries };
        let payload = record.serialize()?;
        if payload.len() > MAX_FRAME_LEN as usize {
            return Err(AtlasError::Engine(format!(
                "commit record too large: {} bytes",
                payload.len()
            )));
        }

        let commit_offset = position;
        frame::encode_frame(&mut buf, FrameKind::Commit, &payload);
        Ok((buf, record, commit_offset))
    }

    fn write_at_end(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.seek(SeekFrom::Start(self.end))?;
        self.writer.write_all(buf)?;
        self.writer.flush()?;
        if self.should_sync() {
            self.writer.sync_data()?;
        }
        Ok(())
    }
}

impl StorageEngine for FileEngine {
    fn save(&mut self, info: DocInfo, doc: Document) -> Result<()> {
        self.ensure_open()?;
        Self::validate(&info, &doc)?;
        self.pending.push((info, doc));
        Ok(())
    }

    fn apply_batch(&mut self, batch: Vec<(DocInfo, Document)>) -> Result<()> {
        self.ensure_open()?;
        for (info, doc) in &batch {
            Self::validate(info, doc)?;
        }
        self.pending.extend(batch);
        Ok(())
    }

    /// Commit queued writes
    ///
    /// Steps:
    /// 1. Encode bodies + commit record into one buffer
    /// 2. Append it at the end of the file and sync per strategy
    /// 3. Apply the entries to the in-memory index
    ///
    /// Queued writes are dropped whether or not the commit succeeds.
    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        let (buf, record, commit_offset) = self.encode_commit(&pending)?;

        if let Err(e) = self.write_at_end(&buf) {
            // Cut off whatever part of the commit reached the file.
            if let Err(trunc) = self.writer.set_len(self.end) {
                tracing::error!("Failed to roll back partial commit: {}", trunc);
            }
            return Err(e);
        }

        let written = record.entries.len();
        for entry in record.entries {
            self.index.insert(entry.id.clone(), entry);
        }
        self.header = record.header;
        self.header_position = commit_offset;
        self.end += buf.len() as u64;

        tracing::debug!(
            "Committed {} writes, update_seq={}, header at {}",
            written,
            self.header.update_seq,
            commit_offset
        );
        Ok(())
    }

    fn lookup_by_id(&self, id: &[u8]) -> Result<DocInfo> {
        self.ensure_open()?;
        self.index
            .get(id)
            .map(|record| self.issue_info(record))
            .ok_or(AtlasError::NotFound)
    }

    fn open_body(&self, info: &DocInfo) -> Result<Document> {
        self.ensure_open()?;
        let body = info.body();

        let value = if body.len == 0 {
            Bytes::new()
        } else {
            let mut reader = self.reader.lock();
            reader.seek(SeekFrom::Start(body.offset))?;
            let payload = frame::read_frame_at(&mut *reader, FrameKind::Body, body.len)?;
            Bytes::from(payload)
        };

        Ok(Document::from_engine(
            info.id_bytes().clone(),
            value,
            self.handles.issue(HandleKind::Doc),
        ))
    }

    fn iterate_from(
        &self,
        start: &[u8],
        visitor: &mut dyn FnMut(DocInfo) -> Result<()>,
    ) -> Result<()> {
        self.ensure_open()?;
        let range = self
            .index
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded));

        for (_, record) in range {
            visitor(self.issue_info(record))?;
        }
        Ok(())
    }

    fn info(&self) -> Result<DbInfo> {
        self.ensure_open()?;
        Ok(DbInfo {
            doc_count: self.header.doc_count,
            deleted_count: self.header.deleted_count,
            space_used: self.header.space_used,
            header_position: self.header_position,
            last_sequence: self.header.update_seq,
            file_size: self.end,
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.pending.is_empty() {
            tracing::debug!(
                "Discarding {} uncommitted writes on close of {}",
                self.pending.len(),
                self.path.display()
            );
            self.pending.clear();
        }

        self.writer.sync_all()?;
        Ok(())
    }

    fn live_handles(&self) -> usize {
        self.handles.live_count()
    }
}
