//! Invariants for the entry codec and the trace cache.
//!
//! These tests treat:
//! - `unpack` as the exact inverse of `pack` for every compression tag,
//! - `prune_traces` as a fixed-length rewrite that touches only the
//!   signatures and context-free data of the requested traces, and
//! - the cache as holding no state across blocks.

use proptest::prelude::*;
use shtrace_core::prelude::*;
use shtrace_core::Error;
use std::collections::HashSet;
use std::sync::Arc;

/// Build a trace with an optional partial carrying `sigs` / `cfd`.
#[track_caller]
fn mk_trace(
    seed: u64,
    block_num: u32,
    partial: Option<(Vec<Vec<u8>>, Vec<Vec<u8>>)>,
    console: String,
) -> TransactionTrace {
    let partial = partial.map(|(sigs, cfd)| {
        PartialTransaction::V0(PartialTransactionV0 {
            expiration: 1_600_000_000 + (seed as u32),
            ref_block_num: (block_num & 0xffff) as u16,
            max_net_usage_words: VarUint32(seed as u32 % 1000),
            signatures: sigs.into_iter().map(|s| Signature(Bytes(s))).collect(),
            context_free_data: cfd.into_iter().map(Bytes).collect(),
            ..Default::default()
        })
    });
    TransactionTrace::V0(TransactionTraceV0 {
        id: Digest::of(&seed.to_le_bytes()),
        block_num,
        receipt: Some(TransactionReceiptHeader {
            status: TransactionStatus::Executed,
            cpu_usage_us: 100 + seed as u32 % 900,
            net_usage_words: VarUint32(12),
        }),
        elapsed: 250,
        net_usage: 96,
        action_traces: vec![ActionTrace::V0(ActionTraceV0 {
            action_ordinal: VarUint32(1),
            receiver: Name::from_ascii("alice"),
            console,
            ..Default::default()
        })],
        partial,
        ..Default::default()
    })
}

fn arb_blob() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..80)
}

fn arb_partial() -> impl Strategy<Value = Option<(Vec<Vec<u8>>, Vec<Vec<u8>>)>> {
    prop::option::weighted(
        0.85,
        (
            prop::collection::vec(arb_blob(), 0..4),
            prop::collection::vec(arb_blob(), 0..3),
        ),
    )
}

/// A block's worth of traces with distinct ids.
fn arb_traces() -> impl Strategy<Value = Vec<TransactionTrace>> {
    prop::collection::vec((arb_partial(), "[a-z ]{0,24}"), 0..8).prop_map(|v| {
        v.into_iter()
            .enumerate()
            .map(|(i, (partial, console))| mk_trace(i as u64, 42, partial, console))
            .collect()
    })
}

fn arb_compression() -> impl Strategy<Value = CompressionType> {
    prop_oneof![Just(CompressionType::None), Just(CompressionType::Zlib)]
}

/// Expected view after pruning: matched partials lose sigs and cfd.
fn pruned_view(traces: &[TransactionTrace], ids: &HashSet<TransactionId>) -> Vec<TransactionTrace> {
    traces
        .iter()
        .cloned()
        .map(|mut t| {
            if ids.contains(t.id()) {
                if let Some(PartialTransaction::V0(p)) = t.as_v0_mut().partial.as_mut() {
                    p.prune();
                }
            }
            t
        })
        .collect()
}

/// A nested failed deferred trace is prunable under its own id.
#[test]
fn nested_failed_trace_is_pruned_under_its_id() {
    let inner = mk_trace(7, 5, Some((vec![vec![1; 65]], vec![vec![2; 9]])), String::new());
    let inner_id = *inner.id();
    let mut outer = mk_trace(8, 5, None, "onerror".into());
    outer.as_v0_mut().failed_dtrx_trace = Some(Box::new(inner));

    let mut entry =
        TraceConverter::pack_entry(&(), true, &[outer], CompressionType::None).unwrap();
    let mut ids: HashSet<_> = [inner_id].into();
    assert!(TraceConverter::prune_traces(&mut entry, &mut ids).unwrap().is_some());
    assert!(ids.is_empty());

    let back = TraceConverter::unpack(&entry).unwrap();
    let nested = back[0].as_v0().failed_dtrx_trace.as_deref().unwrap();
    assert!(nested.partial_v0().unwrap().is_pruned());
}

#[test]
fn nesting_past_two_failed_trace_levels_is_corrupt() {
    let wrap = |inner: TransactionTrace, seed: u64| {
        let mut outer = mk_trace(seed, 5, None, String::new());
        outer.as_v0_mut().failed_dtrx_trace = Some(Box::new(inner));
        outer
    };
    let leaf = mk_trace(1, 5, Some((vec![vec![1; 65]], vec![])), String::new());
    let two = wrap(wrap(leaf, 2), 3);
    let entry = TraceConverter::pack_entry(&(), true, &[two.clone()], CompressionType::None).unwrap();
    assert_eq!(TraceConverter::unpack(&entry).unwrap(), vec![two.clone()]);

    let three = wrap(two, 4);
    let mut entry = TraceConverter::pack_entry(&(), true, &[three], CompressionType::Zlib).unwrap();
    assert!(TraceConverter::unpack(&entry).unwrap_err().is_corrupt());
    let mut ids: HashSet<_> = [Digest::of(&1u64.to_le_bytes())].into();
    assert!(TraceConverter::prune_traces(&mut entry, &mut ids).unwrap_err().is_corrupt());
    assert_eq!(ids.len(), 1);
}

/// A small entry claiming a very deep `failed_dtrx_trace` chain fails the
/// read instead of exhausting the stack.
#[test]
fn deep_failed_trace_chain_is_rejected() {
    let mut link = shtrace_core::converter::encode_traces(&[mk_trace(9, 5, None, String::new())]);
    // drop the count byte and the trailing `failed_dtrx_trace`/`partial` flags
    link.truncate(link.len() - 2);
    link.remove(0);
    link.push(1);

    let mut plain = vec![1u8];
    for _ in 0..50_000 {
        plain.extend_from_slice(&link);
    }

    let mut none_entry = vec![CompressionType::None.tag()];
    none_entry.extend_from_slice(&plain);
    assert!(TraceConverter::unpack(&none_entry).unwrap_err().is_corrupt());

    let mut zlib_entry = vec![CompressionType::Zlib.tag()];
    zlib_entry.extend(
        shtrace_core::compression::encode_payload(CompressionType::Zlib, &plain).unwrap(),
    );
    assert!(zlib_entry.len() < plain.len() / 100);
    assert!(TraceConverter::unpack(&zlib_entry).unwrap_err().is_corrupt());
}

/// Padding after an entry's logical end never changes what is decoded.
#[test]
fn trailing_padding_is_inert() {
    let traces = vec![mk_trace(1, 1, Some((vec![vec![3; 65]], vec![])), "hi".into())];
    for ct in [CompressionType::None, CompressionType::Zlib] {
        let mut entry = TraceConverter::pack_entry(&(), true, &traces, ct).unwrap();
        entry.extend_from_slice(&[0u8; 33]);
        assert_eq!(TraceConverter::unpack(&entry).unwrap(), traces);
    }
}

/// Cache isolation: nothing from block N is visible when preparing N+1.
#[test]
fn cache_holds_nothing_across_blocks() {
    let mut cache = TraceCache::new();
    let ptrxs: Vec<_> = (0u32..4)
        .map(|i| {
            let mut trx = Transaction::default();
            trx.header.expiration = i;
            Arc::new(PackedTransaction::new(trx, vec![Signature(Bytes(vec![9; 65]))], vec![]))
        })
        .collect();
    for p in &ptrxs {
        let mut t = mk_trace(0, 1, None, String::new());
        t.as_v0_mut().id = *p.id();
        cache.add_transaction(Arc::new(t), Some(p.clone()));
    }

    let block = AcceptedBlock {
        block_num: 1,
        timestamp: 2,
        transactions: vec![*ptrxs[2].id(), *ptrxs[0].id()],
    };
    let traces = cache.prepare_traces(&block).unwrap();
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].id(), ptrxs[2].id());
    assert!(cache.is_empty());

    let next = AcceptedBlock {
        block_num: 2,
        timestamp: 4,
        transactions: vec![*ptrxs[1].id()],
    };
    assert!(matches!(cache.prepare_traces(&next), Err(Error::MissingTrace(_))));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64, // good CI/runtime balance
        .. ProptestConfig::default()
    })]

    // Property: unpack(pack(x)) == x for both codecs.
    #[test]
    fn pack_unpack_roundtrip(traces in arb_traces(), ct in arb_compression()) {
        let entry = TraceConverter::pack_entry(&(), true, &traces, ct).unwrap();
        prop_assert_eq!(entry[0], ct.tag());
        prop_assert_eq!(TraceConverter::unpack(&entry).unwrap(), traces);
    }

    // Property: pruning keeps the entry length, redacts exactly the matched
    // partials, and reports unmatched ids back.
    #[test]
    fn prune_is_length_invariant(
        traces in arb_traces(),
        ct in arb_compression(),
        picks in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut entry = TraceConverter::pack_entry(&(), true, &traces, ct).unwrap();
        let before = entry.clone();
        let stranger = Digest::of(b"not in this block");

        let requested: HashSet<TransactionId> = traces
            .iter()
            .zip(&picks)
            .filter(|(_, &p)| p)
            .map(|(t, _)| *t.id())
            .chain(std::iter::once(stranger))
            .collect();
        let mut ids = requested.clone();

        match TraceConverter::prune_traces(&mut entry, &mut ids) {
            Ok(changed) => {
                prop_assert_eq!(entry.len(), before.len());
                if changed.is_none() {
                    prop_assert_eq!(&entry, &before);
                }
                let expected = pruned_view(&traces, &requested);
                prop_assert_eq!(TraceConverter::unpack(&entry).unwrap(), expected);

                prop_assert!(ids.contains(&stranger));
                for t in &traces {
                    let left = ids.contains(t.id());
                    let asked = requested.contains(t.id());
                    prop_assert_eq!(left, asked && t.partial_v0().is_none());
                }
            }
            Err(Error::UnsupportedOperation(_)) => {
                prop_assert_eq!(ct, CompressionType::Zlib);
                prop_assert_eq!(&entry, &before);
                prop_assert_eq!(&ids, &requested);
            }
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }

    // Property: a second prune of the same ids changes nothing.
    #[test]
    fn prune_is_idempotent(traces in arb_traces(), ct in arb_compression()) {
        let mut entry = TraceConverter::pack_entry(&(), true, &traces, ct).unwrap();
        let all: HashSet<_> = traces.iter().map(|t| *t.id()).collect();

        let mut first = all.clone();
        if TraceConverter::prune_traces(&mut entry, &mut first).is_ok() {
            let snapshot = entry.clone();
            let mut second = all.clone();
            prop_assert_eq!(TraceConverter::prune_traces(&mut entry, &mut second).unwrap(), None);
            prop_assert_eq!(&entry, &snapshot);
            prop_assert_eq!(first, second);
        }
    }

    // Property: ids absent from the entry leave it byte-for-byte unchanged.
    #[test]
    fn prune_unknown_ids_is_noop(traces in arb_traces(), ct in arb_compression(), seed in 1000u64..2000) {
        let mut entry = TraceConverter::pack_entry(&(), true, &traces, ct).unwrap();
        let before = entry.clone();
        let mut ids: HashSet<_> = [Digest::of(&seed.to_le_bytes())].into();
        prop_assert_eq!(TraceConverter::prune_traces(&mut entry, &mut ids).unwrap(), None);
        prop_assert_eq!(entry, before);
        prop_assert_eq!(ids.len(), 1);
    }

    // Property: arbitrary bytes never panic the decoder or the pruner.
    #[test]
    fn garbage_is_rejected_not_panicked(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = TraceConverter::unpack(&bytes);
        let mut buf = bytes.clone();
        let mut ids: HashSet<_> = [Digest::of(b"x")].into();
        if TraceConverter::prune_traces(&mut buf, &mut ids).is_err() {
            prop_assert_eq!(buf, bytes);
        }
    }
}
