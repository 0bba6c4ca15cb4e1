//! Crate-local error type shared by the codec, the cache, and the trace log.
//!
//! The variants mirror how a caller is expected to react:
//! - [`Error::CorruptLog`]: the bytes of one entry cannot be decoded. Fatal
//!   for that read only; other entries are unaffected.
//! - [`Error::UnsupportedOperation`]: the request is well-formed but cannot be
//!   carried out on this entry (e.g. a pruned zlib stream no longer fits its
//!   fixed-length region). Nothing was modified.
//! - [`Error::InvalidSequence`]: a caller contract violation (out of order or
//!   duplicate `store`). Nothing was modified.
//! - [`Error::MissingTrace`]: an accepted block references a transaction that
//!   was never applied.
//! - [`Error::Io`]: the underlying file operation failed.

use crate::types::TransactionId;
use thiserror::Error;

/// Errors produced by the trace history core.
#[derive(Debug, Error)]
pub enum Error {
    /// Unparseable tag, truncated record, or failed decompression.
    #[error("corrupt trace log: {0}")]
    CorruptLog(String),

    /// The entry is in a form that cannot be modified as requested.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// `store` was called out of block order or twice for the same block.
    #[error("invalid sequence: block {block_num} does not follow last stored block {last}")]
    InvalidSequence {
        /// Block number the caller tried to store.
        block_num: u32,
        /// Highest block number already in the log.
        last: u32,
    },

    /// A block lists a transaction whose trace was never cached.
    #[error("missing trace for transaction {0}")]
    MissingTrace(TransactionId),

    /// Disk read/write/flush failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::CorruptLog`].
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptLog(msg.into())
    }

    /// Returns `true` for [`Error::CorruptLog`].
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptLog(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
