//! Read-only view of chain state consulted while packing a block's traces.
//!
//! The trace bytes never depend on this context; it only resolves auxiliary
//! values (block timing) that show up in diagnostics.

/// Chain state accessor handed to [`crate::TraceConverter::pack`].
pub trait HistoryContext {
    /// Timestamp (half-second slots) of `block_num`, if the chain knows it.
    fn block_timestamp(&self, block_num: u32) -> Option<u32>;
}

/// No chain state available.
impl HistoryContext for () {
    fn block_timestamp(&self, _block_num: u32) -> Option<u32> {
        None
    }
}

/// Fixed lookup table, handy for replaying stored blocks and for tests.
impl HistoryContext for std::collections::BTreeMap<u32, u32> {
    fn block_timestamp(&self, block_num: u32) -> Option<u32> {
        self.get(&block_num).copied()
    }
}
