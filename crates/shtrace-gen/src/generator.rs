//! Seeded synthetic chain used by the CLI `simulate` subcommand, the bench
//! harness, and log tests.
//!
//! Every block starts with the `eosio::onblock` system trace (no packed
//! transaction), followed by `txs_per_block` token transfers. Some transfers
//! are failed deferred transactions wrapped in an `onerror` trace, and some
//! blocks carry a receipt-less trace that never makes it into the block.

use crate::params::GenParams;
use anyhow::Result;
use rand::{rngs::StdRng, Rng as _, SeedableRng};
use shtrace_core::prelude::*;
use std::sync::Arc;

/// One `(trace, packed transaction)` pair as reported by the engine.
pub type Applied = (Arc<TransactionTrace>, Option<Arc<PackedTransaction>>);

const SYSTEM: Name = Name::from_ascii("eosio");
const TOKEN: Name = Name::from_ascii("eosio.token");

/// A generated block: what was applied, and what was accepted.
#[derive(Clone, Debug)]
pub struct SimBlock {
    /// Accepted-block descriptor.
    pub block: AcceptedBlock,
    /// Applied transactions in execution order.
    pub applied: Vec<Applied>,
}

impl SimBlock {
    /// Replay the applied transactions into `cache`.
    pub fn feed(&self, cache: &mut TraceCache) {
        for (trace, packed) in &self.applied {
            cache.add_transaction(Arc::clone(trace), packed.clone());
        }
    }

    /// Block number.
    #[must_use]
    pub const fn block_num(&self) -> u32 {
        self.block.block_num
    }
}

/// Deterministic block source. Iterates until block numbers run out.
#[derive(Debug)]
pub struct ChainGenerator {
    rng: StdRng,
    params: GenParams,
    next_block: Option<u32>,
    global_sequence: u64,
}

impl ChainGenerator {
    /// Validate `params` and seed the generator.
    pub fn new(params: GenParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(params.seed),
            next_block: Some(params.start_block),
            params,
            global_sequence: 0,
        })
    }

    /// Parameters in use.
    #[must_use]
    pub const fn params(&self) -> &GenParams {
        &self.params
    }

    fn block(&mut self, block_num: u32) -> SimBlock {
        let mut applied = Vec::with_capacity(self.params.txs_per_block + 2);
        let mut ids = Vec::with_capacity(self.params.txs_per_block);

        let onblock = self.onblock_trace(block_num);
        applied.push((Arc::new(onblock), None));

        for i in 0..self.params.txs_per_block {
            let packed = Arc::new(self.packed_transfer(block_num, i));
            ids.push(*packed.id());

            let trace = if self.rng.random_bool(self.params.failed_dtrx_ratio) {
                self.onerror_trace(block_num, &packed)
            } else {
                self.transfer_trace(block_num, *packed.id(), true)
            };
            applied.push((Arc::new(trace), Some(packed)));

            if self.rng.random_bool(self.params.dropped_trace_ratio) {
                let stray = Arc::new(self.packed_transfer(block_num, i + self.params.txs_per_block));
                let trace = self.transfer_trace(block_num, *stray.id(), false);
                applied.push((Arc::new(trace), Some(stray)));
            }
        }

        SimBlock {
            block: AcceptedBlock {
                block_num,
                timestamp: block_num.wrapping_mul(2),
                transactions: ids,
            },
            applied,
        }
    }

    fn packed_transfer(&mut self, block_num: u32, nonce: usize) -> PackedTransaction {
        let mut memo = vec![0u8; 24];
        self.rng.fill(&mut memo[..]);
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(&block_num.to_le_bytes());
        data.extend_from_slice(&(nonce as u64).to_le_bytes());
        data.extend_from_slice(&memo);

        let trx = Transaction {
            header: TransactionHeader {
                expiration: 1_600_000_000 + block_num / 2 + 30,
                ref_block_num: (block_num.saturating_sub(1) & 0xffff) as u16,
                ref_block_prefix: self.rng.random(),
                max_net_usage_words: VarUint32(0),
                max_cpu_usage_ms: 0,
                delay_sec: VarUint32(0),
            },
            actions: vec![Action {
                account: TOKEN,
                name: Name::from_ascii("transfer"),
                authorization: vec![PermissionLevel {
                    actor: Name::from_ascii("alice"),
                    permission: Name::from_ascii("active"),
                }],
                data: Bytes(data),
            }],
            ..Default::default()
        };

        let n_sigs = self.rng.random_range(1..=self.params.max_signatures);
        let signatures = (0..n_sigs)
            .map(|_| {
                let mut sig = vec![0u8; 66];
                self.rng.fill(&mut sig[1..]);
                Signature(Bytes(sig))
            })
            .collect();

        let n_cfd = self.rng.random_range(0..=self.params.max_cfd_segments);
        let context_free_data = (0..n_cfd)
            .map(|_| {
                let mut seg = vec![0u8; self.rng.random_range(0..=self.params.max_cfd_bytes)];
                self.rng.fill(&mut seg[..]);
                Bytes(seg)
            })
            .collect();

        PackedTransaction::new(trx, signatures, context_free_data)
    }

    fn action_trace(&mut self, receiver: Name, act: Action) -> ActionTrace {
        self.global_sequence += 1;
        ActionTrace::V0(ActionTraceV0 {
            action_ordinal: VarUint32(1),
            creator_action_ordinal: VarUint32(0),
            receipt: Some(ActionReceipt {
                receiver,
                act_digest: Digest::of(&act.data.0),
                global_sequence: self.global_sequence,
                recv_sequence: self.global_sequence,
            }),
            receiver,
            act,
            elapsed: self.rng.random_range(5..200),
            ..Default::default()
        })
    }

    fn onblock_trace(&mut self, block_num: u32) -> TransactionTrace {
        let act = Action {
            account: SYSTEM,
            name: Name::from_ascii("onblock"),
            authorization: vec![PermissionLevel {
                actor: SYSTEM,
                permission: Name::from_ascii("active"),
            }],
            data: Bytes(block_num.to_le_bytes().to_vec()),
        };
        let mut seed = b"onblock".to_vec();
        seed.extend_from_slice(&block_num.to_le_bytes());
        TransactionTrace::V0(TransactionTraceV0 {
            id: Digest::of(&seed),
            block_num,
            receipt: Some(TransactionReceiptHeader::default()),
            elapsed: 100,
            action_traces: vec![self.action_trace(SYSTEM, act)],
            ..Default::default()
        })
    }

    fn transfer_trace(&mut self, block_num: u32, id: TransactionId, included: bool) -> TransactionTrace {
        let act = Action {
            account: TOKEN,
            name: Name::from_ascii("transfer"),
            data: Bytes(id.as_bytes()[..8].to_vec()),
            ..Default::default()
        };
        let cpu = self.rng.random_range(100..2000);
        TransactionTrace::V0(TransactionTraceV0 {
            id,
            block_num,
            receipt: included.then(|| TransactionReceiptHeader {
                status: TransactionStatus::Executed,
                cpu_usage_us: cpu,
                net_usage_words: VarUint32(16),
            }),
            elapsed: i64::from(cpu),
            net_usage: 128,
            action_traces: vec![self.action_trace(TOKEN, act)],
            ..Default::default()
        })
    }

    /// `onerror` trace wrapping the failed deferred transaction `packed`.
    fn onerror_trace(&mut self, block_num: u32, packed: &PackedTransaction) -> TransactionTrace {
        let mut failed = self.transfer_trace(block_num, *packed.id(), true);
        {
            let f = failed.as_v0_mut();
            f.except = Some("assertion failure with message: overdrawn balance".into());
            f.error_code = Some(3_050_003);
            if let Some(r) = f.receipt.as_mut() {
                r.status = TransactionStatus::HardFail;
            }
        }
        let mut seed = packed.id().as_bytes().to_vec();
        seed.extend_from_slice(b"onerror");
        let act = Action {
            account: SYSTEM,
            name: Name::from_ascii("onerror"),
            ..Default::default()
        };
        TransactionTrace::V0(TransactionTraceV0 {
            id: Digest::of(&seed),
            block_num,
            receipt: Some(TransactionReceiptHeader {
                status: TransactionStatus::SoftFail,
                cpu_usage_us: 200,
                net_usage_words: VarUint32(0),
            }),
            scheduled: true,
            action_traces: vec![self.action_trace(SYSTEM, act)],
            failed_dtrx_trace: Some(Box::new(failed)),
            ..Default::default()
        })
    }
}

impl Iterator for ChainGenerator {
    type Item = SimBlock;

    fn next(&mut self) -> Option<SimBlock> {
        let block_num = self.next_block?;
        self.next_block = block_num.checked_add(1);
        Some(self.block(block_num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_chain() {
        let a: Vec<_> = ChainGenerator::new(GenParams::default()).unwrap().take(3).collect();
        let b: Vec<_> = ChainGenerator::new(GenParams::default()).unwrap().take(3).collect();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.block, y.block);
            assert_eq!(x.applied.len(), y.applied.len());
        }
        assert_eq!(a[0].block_num(), 2);
        assert_eq!(a[2].block_num(), 4);
    }

    #[test]
    fn blocks_drain_cleanly_through_the_cache() {
        let mut cache = TraceCache::new();
        for sim in ChainGenerator::new(GenParams::default()).unwrap().take(5) {
            sim.feed(&mut cache);
            let traces = cache.prepare_traces(&sim.block).unwrap();
            assert_eq!(traces.len(), sim.block.transactions.len() + 1);
            assert!(shtrace_core::cache::is_onblock(&traces[0]));
            assert!(traces[1..].iter().all(|t| {
                let t = t.as_v0();
                t.partial.is_some() || t.failed_dtrx_trace.is_some()
            }));
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn failed_deferred_traces_carry_the_partial_inside() {
        let params = GenParams {
            failed_dtrx_ratio: 1.0,
            dropped_trace_ratio: 0.0,
            txs_per_block: 3,
            ..GenParams::default()
        };
        let sim = ChainGenerator::new(params).unwrap().next().unwrap();
        let mut cache = TraceCache::new();
        sim.feed(&mut cache);
        let traces = cache.prepare_traces(&sim.block).unwrap();
        for t in &traces[1..] {
            let nested = t.as_v0().failed_dtrx_trace.as_deref().unwrap();
            assert!(nested.partial_v0().is_some());
            assert!(t.as_v0().partial.is_none());
        }
    }

    #[test]
    fn invalid_params_rejected() {
        let bad = GenParams {
            max_signatures: 0,
            ..GenParams::default()
        };
        assert!(ChainGenerator::new(bad).is_err());
    }
}
