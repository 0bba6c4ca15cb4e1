//! Per-block staging of execution traces.
//!
//! Traces arrive one by one as transactions are applied; when the block is
//! accepted they are drained in block order, each augmented with the partial
//! transaction of its packed transaction. Nothing survives across blocks.

use crate::error::{Error, Result};
use crate::partial::PartialTransactionBuilder;
use crate::types::{AcceptedBlock, ActionTrace, Name, PackedTransaction, TransactionId, TransactionTrace};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_ACCOUNT: Name = Name::from_ascii("eosio");
const ONBLOCK: Name = Name::from_ascii("onblock");
const ACTIVE: Name = Name::from_ascii("active");

#[derive(Clone, Debug)]
struct CachedTrace {
    trace: Arc<TransactionTrace>,
    packed: Option<Arc<PackedTransaction>>,
}

/// Traces of the block currently being applied.
#[derive(Debug, Default)]
pub struct TraceCache {
    onblock: Option<CachedTrace>,
    cached: HashMap<TransactionId, CachedTrace>,
}

impl TraceCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied transaction.
    ///
    /// Traces without a receipt never make it into a block and are ignored.
    /// A later call for the same id replaces the earlier one. A trace that
    /// carries a failed deferred transaction is keyed by the failed
    /// transaction's id, since that is the id the block lists.
    pub fn add_transaction(
        &mut self,
        trace: Arc<TransactionTrace>,
        packed: Option<Arc<PackedTransaction>>,
    ) {
        if trace.as_v0().receipt.is_none() {
            return;
        }
        if is_onblock(&trace) {
            self.onblock = Some(CachedTrace { trace, packed });
            return;
        }
        let t = trace.as_v0();
        let key = t.failed_dtrx_trace.as_ref().map_or(t.id, |failed| *failed.id());
        self.cached.insert(key, CachedTrace { trace, packed });
    }

    /// Drain the cache into the ordered trace sequence of `block`.
    ///
    /// The onblock trace, if any, comes first, followed by one trace per id
    /// of `block.transactions`. The cache is empty afterwards even when an id
    /// has no cached trace, in which case [`Error::MissingTrace`] is
    /// returned.
    pub fn prepare_traces(&mut self, block: &AcceptedBlock) -> Result<Vec<TransactionTrace>> {
        let onblock = self.onblock.take();
        let mut cached = std::mem::take(&mut self.cached);

        let mut traces = Vec::with_capacity(block.transactions.len() + 1);
        traces.extend(onblock.map(augment));
        for id in &block.transactions {
            let entry = cached.remove(id).ok_or(Error::MissingTrace(*id))?;
            traces.push(augment(entry));
        }

        debug!(
            block_num = block.block_num,
            traces = traces.len(),
            dropped = cached.len(),
            "prepared block traces"
        );
        Ok(traces)
    }

    /// Number of staged traces, the onblock trace included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cached.len() + usize::from(self.onblock.is_some())
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything staged so far (e.g. when a block is abandoned).
    pub fn clear(&mut self) {
        self.onblock = None;
        self.cached.clear();
    }
}

/// Whether `trace` is the implicit `eosio::onblock` system transaction.
#[must_use]
pub fn is_onblock(trace: &TransactionTrace) -> bool {
    let [ActionTrace::V0(at)] = trace.as_v0().action_traces.as_slice() else {
        return false;
    };
    let act = &at.act;
    act.account == SYSTEM_ACCOUNT
        && act.name == ONBLOCK
        && matches!(
            act.authorization.as_slice(),
            [auth] if auth.actor == SYSTEM_ACCOUNT && auth.permission == ACTIVE
        )
}

fn augment(entry: CachedTrace) -> TransactionTrace {
    let mut trace = Arc::try_unwrap(entry.trace).unwrap_or_else(|shared| (*shared).clone());
    if let Some(packed) = &entry.packed {
        attach_partial(&mut trace, packed);
    }
    trace
}

/// The packed transaction belongs to the innermost failed deferred trace
/// when there is one, otherwise to the trace itself.
fn attach_partial(trace: &mut TransactionTrace, packed: &PackedTransaction) {
    let t = trace.as_v0_mut();
    match t.failed_dtrx_trace.as_deref_mut() {
        Some(failed) => attach_partial(failed, packed),
        None => t.partial = Some(PartialTransactionBuilder::build(packed)),
    }
}
