//! JSON Lines (NDJSON) helpers for streaming [`BlockTraces`] export.
//!
//! One block per line, so a whole log can be dumped or re-read without
//! materializing it. `.jsonl` and `.ndjson` are treated the same.

use crate::io::{display, ensure_parent_dir, BlockTraces};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Owning JSONL iterator over [`BlockTraces`].
///
/// Holds the buffered reader so no borrowed `Lines<'_>` escapes.
pub struct JsonlTraceIter {
    rdr: BufReader<File>,
    buf: String,
    line_no: usize,
}

impl JsonlTraceIter {
    fn new(file: File) -> Self {
        Self {
            rdr: BufReader::new(file),
            buf: String::with_capacity(8 << 10),
            line_no: 0,
        }
    }
}

impl Iterator for JsonlTraceIter {
    type Item = Result<BlockTraces>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.rdr.read_line(&mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                let line = self.buf.trim_end_matches(['\n', '\r']);
                if line.is_empty() {
                    return Some(Err(anyhow::anyhow!(
                        "parse jsonl line {}: empty line",
                        self.line_no
                    )));
                }
                Some(
                    serde_json::from_str(line)
                        .with_context(|| format!("parse jsonl line {}", self.line_no)),
                )
            }
            Err(e) => Some(Err(e).with_context(|| format!("read line {}", self.line_no + 1))),
        }
    }
}

/// Stream read: yields one [`BlockTraces`] per line, with the line number
/// attached to per-line errors.
pub fn stream_block_traces_jsonl<P: AsRef<Path>>(path: P) -> Result<JsonlTraceIter> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).with_context(|| format!("open {}", display(path_ref)))?;
    Ok(JsonlTraceIter::new(f))
}

/// Incremental JSONL writer, for exporting a log block by block.
pub struct JsonlTraceWriter {
    w: BufWriter<File>,
    written: usize,
}

impl JsonlTraceWriter {
    /// Create (truncate) `path`, creating parent directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        ensure_parent_dir(path_ref)?;
        let f = File::create(path_ref).with_context(|| format!("create {}", display(path_ref)))?;
        Ok(Self {
            w: BufWriter::new(f),
            written: 0,
        })
    }

    /// Append one block.
    pub fn write(&mut self, block: &BlockTraces) -> Result<()> {
        serde_json::to_writer(&mut self.w, block).context("serialize block traces to json")?;
        self.w.write_all(b"\n").context("write newline")?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of blocks written.
    pub fn finish(mut self) -> Result<usize> {
        self.w.flush().context("flush writer")?;
        Ok(self.written)
    }
}

/// Write blocks as JSON Lines (one object per line).
pub fn write_block_traces_jsonl<P: AsRef<Path>>(path: P, blocks: &[BlockTraces]) -> Result<()> {
    let mut w = JsonlTraceWriter::create(path)?;
    for b in blocks {
        w.write(b)?;
    }
    w.finish()?;
    Ok(())
}
