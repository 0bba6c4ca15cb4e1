//! shtrace-core: transaction-trace history, data model, per-block trace
//! cache, and the prunable trace-log entry codec.
//!
//! This crate defines the **stable boundary** used across the workspace:
//! - canonical data types (`TransactionTrace`, `PartialTransaction`, …) and
//!   their raw binary encoding,
//! - the [`TraceCache`] that stages traces while a block is applied,
//! - the [`TraceConverter`] that packs, unpacks, and prunes log entries, and
//! - JSON/CBOR export (with `.jsonl/.ndjson` streaming helpers).
//!
//! The file-backed log itself lives in `shtrace-log`.
//!
//! ```
//! use shtrace_core::prelude::*;
//! use std::sync::Arc;
//!
//! let ptrx = Arc::new(PackedTransaction::new(Transaction::default(), vec![], vec![]));
//! let trace = TransactionTrace::V0(TransactionTraceV0 {
//!     id: *ptrx.id(),
//!     receipt: Some(TransactionReceiptHeader::default()),
//!     ..Default::default()
//! });
//!
//! let mut cache = TraceCache::new();
//! cache.add_transaction(Arc::new(trace), Some(ptrx.clone()));
//! let block = AcceptedBlock { block_num: 1, timestamp: 0, transactions: vec![*ptrx.id()] };
//! let traces = cache.prepare_traces(&block)?;
//!
//! let entry = TraceConverter::pack_entry(&(), true, &traces, CompressionType::Zlib)?;
//! assert_eq!(TraceConverter::unpack(&entry)?, traces);
//! # Ok::<(), shtrace_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Per-block trace staging.
pub mod cache;
/// Entry compression envelope (none / zlib).
pub mod compression;
/// Chain-state accessor consulted at pack time.
pub mod context;
/// Entry codec: pack, unpack, prune.
pub mod converter;
/// Crate error type.
pub mod error;
/// JSON/CBOR export helpers and auto-detecting read/write APIs.
pub mod io;
/// Streaming JSONL/NDJSON helpers for large exports.
pub mod io_jsonl;
/// Partial transaction construction.
pub mod partial;
/// Raw binary encoding.
pub mod raw;
/// Canonical data types shared across the workspace.
pub mod types;

pub use cache::TraceCache;
pub use compression::CompressionType;
pub use context::HistoryContext;
pub use converter::TraceConverter;
pub use error::{Error, Result};
pub use io::BlockTraces;
pub use partial::PartialTransactionBuilder;
pub use types::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use shtrace_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::raw::{Bytes, VarUint32};
    pub use crate::types::*;
    pub use crate::{
        BlockTraces, CompressionType, HistoryContext, PartialTransactionBuilder, TraceCache,
        TraceConverter,
    };
}
