//! Block-shape parameters for the synthetic chain.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// How generated blocks look.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenParams {
    /// RNG seed; the same seed always yields the same chain.
    pub seed: u64,
    /// First block number produced.
    pub start_block: u32,
    /// User transactions per block (the onblock trace comes on top).
    pub txs_per_block: usize,
    /// Upper bound on signatures per transaction (at least one is drawn).
    pub max_signatures: usize,
    /// Upper bound on context-free data segments per transaction.
    pub max_cfd_segments: usize,
    /// Upper bound on the size of one context-free data segment.
    pub max_cfd_bytes: usize,
    /// Probability that a transaction is a failed deferred transaction
    /// wrapped in an `onerror` trace.
    pub failed_dtrx_ratio: f64,
    /// Probability of an extra receipt-less trace that never lands in the
    /// block.
    pub dropped_trace_ratio: f64,
}

impl Default for GenParams {
    fn default() -> Self {
        Self {
            seed: 42,
            start_block: 2,
            txs_per_block: 8,
            max_signatures: 2,
            max_cfd_segments: 2,
            max_cfd_bytes: 64,
            failed_dtrx_ratio: 0.05,
            dropped_trace_ratio: 0.1,
        }
    }
}

impl GenParams {
    /// Reject parameter sets the generator cannot honor.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_signatures >= 1, "max_signatures must be at least 1");
        ensure!(
            (0.0..=1.0).contains(&self.failed_dtrx_ratio),
            "failed_dtrx_ratio must be within [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.dropped_trace_ratio),
            "dropped_trace_ratio must be within [0, 1]"
        );
        Ok(())
    }
}
