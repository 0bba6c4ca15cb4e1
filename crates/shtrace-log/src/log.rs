//! File-backed, append-only trace log.
//!
//! A log directory holds two files:
//! - [`LOG_FILE`]: concatenated frames `[EntryHeader][entry bytes]`, one per
//!   stored block, where the entry bytes are produced by
//!   [`TraceConverter`];
//! - [`INDEX_FILE`]: one 20-byte [`IndexRecord`] per frame.
//!
//! Entries never move and never change length. Pruning rewrites bytes inside
//! an entry only.
//!
//! # Crash recovery
//!
//! `store` writes the frame first and the index record second, so after a
//! crash the log may hold a frame the index does not know about, and the
//! index may end in a partial record. [`TraceLog::open`] repairs both:
//! partial index records are dropped, index records pointing past the end of
//! the log are dropped, and log bytes past the last indexed entry are
//! truncated, so a frame whose index record never reached disk is dropped
//! even when it is the first one. Only a missing index file is rebuilt by
//! walking the frame headers.
//!
//! # Consistency
//!
//! All mutating and reading methods take `&mut self`; sharing a log between
//! threads needs an outer lock. With a read cache enabled, a prune through
//! this instance evicts that block, so later reads observe the pruned bytes.
//! Another instance over the same directory only sees a prune after
//! [`TraceLog::invalidate_cache`] or a reopen.

use crate::config::TraceLogConfig;
use crate::index::{EntryHeader, IndexRecord, PositionIndex, HEADER_SIZE, RECORD_SIZE};
use lru::LruCache;
use shtrace_core::{
    AcceptedBlock, Error, HistoryContext, Result, TraceCache, TraceConverter, TransactionId,
    TransactionTrace,
};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Log file name inside the log directory.
pub const LOG_FILE: &str = "trace_history.log";
/// Index file name inside the log directory.
pub const INDEX_FILE: &str = "trace_history.index";

/// Append-only trace log with a position index.
#[derive(Debug)]
pub struct TraceLog {
    dir: PathBuf,
    config: TraceLogConfig,
    log: File,
    index_file: File,
    index: PositionIndex,
    log_len: u64,
    read_cache: Option<LruCache<u32, Vec<TransactionTrace>>>,
}

impl TraceLog {
    /// Open (or create) the log in `dir`, recovering from an interrupted
    /// append if needed.
    pub fn open<P: AsRef<Path>>(dir: P, config: TraceLogConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let index_path = dir.join(INDEX_FILE);
        let index_missing = !index_path.try_exists()?;
        let mut log = open_rw(&dir.join(LOG_FILE))?;
        let mut index_file = open_rw(&index_path)?;

        let mut raw = Vec::new();
        index_file.read_to_end(&mut raw)?;
        let (mut index, partial) = PositionIndex::decode(&raw)?;
        let mut rewrite_index = false;
        if partial > 0 {
            warn!(bytes = partial, "dropping partial trailing index record");
            rewrite_index = true;
        }

        let mut log_len = log.metadata()?.len();
        let reachable = index.iter().take_while(|r| r.end() <= log_len).count();
        if reachable < index.len() {
            warn!(
                dropped = index.len() - reachable,
                log_len, "index records point past the end of the log"
            );
            index.truncate(reachable);
            rewrite_index = true;
        }

        if index_missing && log_len > 0 {
            index = scan_frames(&mut log, log_len)?;
            info!(entries = index.len(), "rebuilt trace log index from frame headers");
            rewrite_index = true;
        }

        if let Some(last) = index.last() {
            verify_frame(&mut log, last)?;
        }

        let end = index.last().map_or(0, IndexRecord::end);
        if log_len > end {
            warn!(bytes = log_len - end, "truncating unindexed log tail");
            log.set_len(end)?;
            log_len = end;
        }

        if rewrite_index {
            index_file.set_len(0)?;
            index_file.seek(SeekFrom::Start(0))?;
            index_file.write_all(&index.encode())?;
            index_file.flush()?;
            if config.sync_writes {
                index_file.sync_data()?;
                log.sync_data()?;
            }
        }

        let read_cache = NonZeroUsize::new(config.read_cache_entries).map(LruCache::new);
        info!(
            dir = %dir.display(),
            entries = index.len(),
            first = ?index.first().map(|r| r.block_num),
            last = ?index.last().map(|r| r.block_num),
            "opened trace log"
        );

        Ok(Self {
            dir,
            config,
            log,
            index_file,
            index,
            log_len,
            read_cache,
        })
    }

    /// Drain `cache` for `block` and append the packed traces.
    ///
    /// `block.block_num` must be greater than every stored block, otherwise
    /// [`Error::InvalidSequence`] is returned before the cache is touched.
    pub fn store(
        &mut self,
        ctx: &dyn HistoryContext,
        cache: &mut TraceCache,
        block: &AcceptedBlock,
    ) -> Result<IndexRecord> {
        self.check_sequence(block.block_num)?;
        let traces = cache.prepare_traces(block)?;
        self.append(ctx, block.block_num, &traces)
    }

    /// Pack `traces` and append them as the entry of `block_num`.
    pub fn append(
        &mut self,
        ctx: &dyn HistoryContext,
        block_num: u32,
        traces: &[TransactionTrace],
    ) -> Result<IndexRecord> {
        self.check_sequence(block_num)?;
        let entry = TraceConverter::pack_entry(
            ctx,
            self.config.include_traces,
            traces,
            self.config.compression,
        )?;

        let frame_start = self.log_len;
        let rec = IndexRecord {
            block_num,
            offset: frame_start + HEADER_SIZE,
            length: entry.len() as u64,
        };
        let header = EntryHeader {
            block_num,
            length: rec.length,
        };

        let written = self
            .write_frame(frame_start, &header, &entry)
            .and_then(|()| self.write_index_record(&rec));
        if let Err(e) = written {
            self.roll_back(frame_start);
            return Err(e);
        }
        self.index.push(rec)?;
        self.log_len = rec.end();

        debug!(
            block_num,
            traces = traces.len(),
            offset = rec.offset,
            bytes = rec.length,
            "stored block traces"
        );
        Ok(rec)
    }

    /// Decoded traces of `block_num`; empty when the block is not stored.
    pub fn get_traces(&mut self, block_num: u32) -> Result<Vec<TransactionTrace>> {
        let Some(rec) = self.index.get(block_num).copied() else {
            return Ok(Vec::new());
        };
        if let Some(hit) = self.read_cache.as_mut().and_then(|c| c.get(&block_num)) {
            return Ok(hit.clone());
        }
        let entry = self.read_entry(&rec)?;
        let traces = TraceConverter::unpack(&entry)?;
        if let Some(c) = self.read_cache.as_mut() {
            c.put(block_num, traces.clone());
        }
        debug!(block_num, traces = traces.len(), "read block traces");
        Ok(traces)
    }

    /// Redact signatures and context-free data of `ids` within the entry of
    /// `block_num`, in place.
    ///
    /// Found ids are removed from `ids`; a block that is not stored leaves
    /// `ids` unchanged. Only the changed bytes are written back.
    pub fn prune_transactions(
        &mut self,
        block_num: u32,
        ids: &mut HashSet<TransactionId>,
    ) -> Result<()> {
        let Some(rec) = self.index.get(block_num).copied() else {
            debug!(block_num, "prune skipped: block not stored");
            return Ok(());
        };
        let requested = ids.len();
        let mut entry = self.read_entry(&rec)?;
        let Some(changed) = TraceConverter::prune_traces(&mut entry, ids)? else {
            debug!(block_num, matched = requested - ids.len(), "prune left entry unchanged");
            return Ok(());
        };

        self.log
            .seek(SeekFrom::Start(rec.offset + changed.start as u64))?;
        self.log.write_all(&entry[changed.clone()])?;
        self.log.flush()?;
        if self.config.sync_writes {
            self.log.sync_data()?;
        }
        if let Some(c) = self.read_cache.as_mut() {
            c.pop(&block_num);
        }

        info!(
            block_num,
            pruned = requested - ids.len(),
            pending = ids.len(),
            bytes = changed.len(),
            "pruned transactions"
        );
        Ok(())
    }

    /// Raw entry bytes of `block_num` (tag + payload), if stored.
    pub fn entry(&mut self, block_num: u32) -> Result<Option<Vec<u8>>> {
        match self.index.get(block_num).copied() {
            Some(rec) => self.read_entry(&rec).map(Some),
            None => Ok(None),
        }
    }

    /// Index record of `block_num`, if stored.
    #[must_use]
    pub fn record(&self, block_num: u32) -> Option<IndexRecord> {
        self.index.get(block_num).copied()
    }

    /// Index records in block order.
    pub fn records(&self) -> impl Iterator<Item = &IndexRecord> + '_ {
        self.index.iter()
    }

    /// First and last stored block.
    #[must_use]
    pub fn block_range(&self) -> Option<RangeInclusive<u32>> {
        Some(self.index.first()?.block_num..=self.index.last()?.block_num)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Size of the log file in bytes.
    #[must_use]
    pub const fn log_len(&self) -> u64 {
        self.log_len
    }

    /// Directory holding the log and index files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TraceLogConfig {
        &self.config
    }

    /// Drop every decoded entry held by the read cache.
    pub fn invalidate_cache(&mut self) {
        if let Some(c) = self.read_cache.as_mut() {
            c.clear();
        }
    }

    fn check_sequence(&self, block_num: u32) -> Result<()> {
        match self.index.last() {
            Some(last) if block_num <= last.block_num => Err(Error::InvalidSequence {
                block_num,
                last: last.block_num,
            }),
            _ => Ok(()),
        }
    }

    fn write_frame(&mut self, at: u64, header: &EntryHeader, entry: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + entry.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(entry);
        self.log.seek(SeekFrom::Start(at))?;
        self.log.write_all(&frame)?;
        self.log.flush()?;
        if self.config.sync_writes {
            self.log.sync_data()?;
        }
        Ok(())
    }

    fn write_index_record(&mut self, rec: &IndexRecord) -> Result<()> {
        let at = (self.index.len() * RECORD_SIZE) as u64;
        self.index_file.seek(SeekFrom::Start(at))?;
        self.index_file.write_all(&rec.to_bytes())?;
        self.index_file.flush()?;
        if self.config.sync_writes {
            self.index_file.sync_data()?;
        }
        Ok(())
    }

    /// Best-effort undo of a failed append: cut both files back to the last
    /// complete entry.
    fn roll_back(&mut self, frame_start: u64) {
        if let Err(e) = self.log.set_len(frame_start) {
            warn!(error = %e, "could not truncate log after failed append");
        }
        let index_len = (self.index.len() * RECORD_SIZE) as u64;
        if let Err(e) = self.index_file.set_len(index_len) {
            warn!(error = %e, "could not truncate index after failed append");
        }
    }

    fn read_entry(&mut self, rec: &IndexRecord) -> Result<Vec<u8>> {
        let len = usize::try_from(rec.length).map_err(|_| {
            Error::CorruptLog(format!("entry of block {} too large to read", rec.block_num))
        })?;
        let mut buf = vec![0u8; len];
        self.log.seek(SeekFrom::Start(rec.offset))?;
        self.log.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn open_rw(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// Rebuild an index by walking frame headers from the start of the log.
/// Stops at the first frame that is truncated or out of order.
fn scan_frames(log: &mut File, log_len: u64) -> Result<PositionIndex> {
    let mut index = PositionIndex::default();
    let mut hdr = [0u8; HEADER_SIZE as usize];
    let mut pos = 0u64;
    while pos + HEADER_SIZE <= log_len {
        log.seek(SeekFrom::Start(pos))?;
        log.read_exact(&mut hdr)?;
        let h = EntryHeader::from_bytes(&hdr);
        let rec = IndexRecord {
            block_num: h.block_num,
            offset: pos + HEADER_SIZE,
            length: h.length,
        };
        let fits = rec.offset.checked_add(rec.length).is_some_and(|end| end <= log_len);
        if !fits || index.push(rec).is_err() {
            warn!(offset = pos, "stopping index rebuild at unreadable frame");
            break;
        }
        pos = rec.end();
    }
    Ok(index)
}

/// Check that the frame header in front of `rec` agrees with it.
fn verify_frame(log: &mut File, rec: &IndexRecord) -> Result<()> {
    let mut hdr = [0u8; HEADER_SIZE as usize];
    log.seek(SeekFrom::Start(rec.frame_start()))?;
    log.read_exact(&mut hdr)?;
    let h = EntryHeader::from_bytes(&hdr);
    if h.block_num != rec.block_num || h.length != rec.length {
        return Err(Error::CorruptLog(format!(
            "frame header {h:?} disagrees with index record {rec:?}"
        )));
    }
    Ok(())
}
