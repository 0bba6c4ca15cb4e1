//! shtrace-log: append-only, prunable trace log.
//!
//! Wraps the entry codec of `shtrace-core` in a log file plus position
//! index, with open-time recovery from interrupted appends and an optional
//! decoded-entry read cache.
//!
//! ```no_run
//! use shtrace_core::prelude::*;
//! use shtrace_log::{TraceLog, TraceLogConfig};
//! use std::collections::HashSet;
//!
//! let mut log = TraceLog::open("/var/lib/node/traces", TraceLogConfig::default())?;
//! let mut cache = TraceCache::new();
//! // ... cache.add_transaction(..) while the block is applied ...
//! let block = AcceptedBlock { block_num: 7, timestamp: 0, transactions: vec![] };
//! log.store(&(), &mut cache, &block)?;
//!
//! let mut ids: HashSet<TransactionId> = HashSet::new();
//! log.prune_transactions(7, &mut ids)?;
//! let traces = log.get_traces(7)?;
//! # Ok::<(), shtrace_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// TOML configuration.
pub mod config;
/// Position index and frame headers.
pub mod index;
/// The log itself.
pub mod log;

pub use config::TraceLogConfig;
pub use index::{IndexRecord, PositionIndex};
pub use log::{TraceLog, INDEX_FILE, LOG_FILE};
