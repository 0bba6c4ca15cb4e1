//! Export helpers for decoded traces.
//!
//! A [`BlockTraces`] pairs a block number with its decoded trace sequence.
//! Files are read and written as JSON or CBOR with extension-based
//! auto-detection: unknown/missing extensions are rejected for reads and
//! default to JSON for writes. `.jsonl` / `.ndjson` go through
//! [`crate::io_jsonl`] and stream one block per line.

use crate::types::TransactionTrace;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Decoded traces of one stored block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTraces {
    /// Block number.
    pub block_num: u32,
    /// Traces in block order.
    pub traces: Vec<TransactionTrace>,
}

/// Ensure the parent directory for a file exists (no-op if none).
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", display(path)))?;
        }
    }
    Ok(())
}

/// Read `Vec<BlockTraces>` from **JSON**.
pub fn read_block_traces_json<P: AsRef<Path>>(path: P) -> Result<Vec<BlockTraces>> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).with_context(|| format!("open {}", display(path_ref)))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| "deserialize JSON block traces")
}

/// Write `Vec<BlockTraces>` to **JSON** (pretty).
pub fn write_block_traces_json<P: AsRef<Path>>(path: P, v: &[BlockTraces]) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let f = File::create(path_ref).with_context(|| format!("create {}", display(path_ref)))?;
    serde_json::to_writer_pretty(BufWriter::new(f), v)
        .with_context(|| "serialize JSON block traces")?;
    Ok(())
}

/// Read `Vec<BlockTraces>` from **CBOR**.
pub fn read_block_traces_cbor<P: AsRef<Path>>(path: P) -> Result<Vec<BlockTraces>> {
    let path_ref = path.as_ref();
    let f = File::open(path_ref).with_context(|| format!("open {}", display(path_ref)))?;
    let mut rdr = BufReader::new(f);
    ciborium::de::from_reader(&mut rdr).with_context(|| "deserialize CBOR block traces")
}

/// Write `Vec<BlockTraces>` to **CBOR**.
pub fn write_block_traces_cbor<P: AsRef<Path>>(path: P, v: &[BlockTraces]) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let f = File::create(path_ref).with_context(|| format!("create {}", display(path_ref)))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(v, &mut w).with_context(|| "serialize CBOR block traces")?;
    Ok(())
}

/// Auto-detect read by extension `.json` / `.cbor` / `.jsonl` / `.ndjson`
/// (case-insensitive).
pub fn read_block_traces_auto<P: AsRef<Path>>(path: P) -> Result<Vec<BlockTraces>> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_block_traces_json(path),
        Some("cbor") => read_block_traces_cbor(path),
        Some("jsonl" | "ndjson") => crate::io_jsonl::stream_block_traces_jsonl(path)?.collect(),
        Some(other) => Err(anyhow!(
            "unsupported traces extension: {other} (supported: .json, .cbor, .jsonl, .ndjson)"
        )),
        None => Err(anyhow!("path has no extension (expected .json, .cbor, .jsonl or .ndjson)")),
    }
}

/// Auto-detect write (defaults to **JSON** if unknown or missing).
pub fn write_block_traces_auto<P: AsRef<Path>>(path: P, v: &[BlockTraces]) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_block_traces_cbor(path, v),
        Some("jsonl" | "ndjson") => crate::io_jsonl::write_block_traces_jsonl(path, v),
        _ => write_block_traces_json(path, v),
    }
}

/// Return the lowercase extension (without dot) if present.
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Human-friendly path display for error messages.
pub(crate) fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
