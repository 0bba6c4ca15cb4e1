//! Trace converter: the codec between a block's trace sequence and one
//! trace-log entry, plus in-place redaction of already-packed entries.
//!
//! # Entry layout
//!
//! ```text
//! byte[1]          compression tag (0 = none, 1 = zlib)
//! byte[len - 1]    payload: trace-sequence encoding, compressed iff tag = 1
//! ```
//!
//! The trace-sequence encoding is a `varuint32` count followed by that many
//! raw-encoded [`TransactionTrace`] records. Decoders stop after the declared
//! count, so bytes after it are padding.
//!
//! # Pruning policy
//!
//! Pruning replaces the `signatures` + `context_free_data` span of each
//! matched partial transaction by the two-byte encoding of two empty
//! sequences, shifts the rest of the sequence down, and zero-fills the tail
//! so the entry keeps its exact length.
//!
//! - `none` entries are compacted directly.
//! - `zlib` entries are inflated, compacted, deflated again, and written back
//!   only if the new stream still fits the original payload region. If it
//!   does not, [`Error::UnsupportedOperation`] is returned and neither the
//!   buffer nor the id set is touched.
//!
//! The new bytes are fully prepared in a scratch buffer before the entry is
//! modified, so a failure never leaves a half-rewritten entry.

use crate::compression::{decode_payload, encode_payload, CompressionType};
use crate::context::HistoryContext;
use crate::error::{Error, Result};
use crate::raw::{pack_varuint32, Pack, Reader};
use crate::types::{unpack_trace_with, PrunableSpan, TransactionId, TransactionTrace};
use std::collections::HashSet;
use std::io::Write;
use std::ops::Range;
use tracing::debug;

/// Encoding of empty `signatures` followed by empty `context_free_data`.
const EMPTY_PRUNABLE: [u8; 2] = [0, 0];

/// Stateless codec for trace-log entries.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceConverter;

impl TraceConverter {
    /// Serialize `traces` as one entry into `out`; returns the bytes written.
    ///
    /// When `include_traces` is false an empty sequence is written whatever
    /// `traces` holds. `ctx` is only consulted for diagnostics.
    pub fn pack<W: Write>(
        out: &mut W,
        ctx: &dyn HistoryContext,
        include_traces: bool,
        traces: &[TransactionTrace],
        compression: CompressionType,
    ) -> Result<usize> {
        let entry = Self::pack_entry(ctx, include_traces, traces, compression)?;
        out.write_all(&entry)?;
        Ok(entry.len())
    }

    /// Like [`TraceConverter::pack`], returning the entry bytes.
    pub fn pack_entry(
        ctx: &dyn HistoryContext,
        include_traces: bool,
        traces: &[TransactionTrace],
        compression: CompressionType,
    ) -> Result<Vec<u8>> {
        let kept: &[TransactionTrace] = if include_traces { traces } else { &[] };
        let plain = encode_traces(kept);
        let payload = encode_payload(compression, &plain)?;

        let mut entry = Vec::with_capacity(1 + payload.len());
        entry.push(compression.tag());
        entry.extend_from_slice(&payload);

        if let Some(first) = kept.first() {
            let block_num = first.as_v0().block_num;
            debug!(
                block_num,
                timestamp = ?ctx.block_timestamp(block_num),
                traces = kept.len(),
                %compression,
                plain_bytes = plain.len(),
                entry_bytes = entry.len(),
                "packed traces"
            );
        }
        Ok(entry)
    }

    /// Decode one entry back into its trace sequence.
    pub fn unpack(entry: &[u8]) -> Result<Vec<TransactionTrace>> {
        let (compression, payload) = split_entry(entry)?;
        let plain = decode_payload(compression, payload)?;
        let mut r = Reader::new(&plain);
        let n = r.seq_len()?;
        let mut traces = Vec::with_capacity(n);
        for _ in 0..n {
            traces.push(unpack_trace_with(&mut r, &mut |_: &TransactionId, _: PrunableSpan| {})?);
        }
        Ok(traces)
    }

    /// Redact signatures and context-free data of every trace in `entry`
    /// whose id is in `ids`.
    ///
    /// Matched ids are removed from `ids`; ids left behind were not found in
    /// this entry or belong to a trace without a partial transaction. The
    /// entry length never changes. Returns the byte range of `entry` that was
    /// rewritten, or `None` if the entry is byte-for-byte unchanged.
    pub fn prune_traces(
        entry: &mut [u8],
        ids: &mut HashSet<TransactionId>,
    ) -> Result<Option<Range<usize>>> {
        if ids.is_empty() {
            return Ok(None);
        }

        let (matched, new_payload) = {
            let (compression, payload) = split_entry(entry)?;
            let plain = decode_payload(compression, payload)?;
            let scan = scan_prunable(&plain, ids)?;

            let new_payload = if scan.spans.is_empty() {
                None
            } else {
                let compacted = compact(&plain[..scan.logical_end], &scan.spans)?;
                let encoded = encode_payload(compression, &compacted)?;
                if encoded.len() > payload.len() {
                    return Err(Error::UnsupportedOperation(format!(
                        "pruned {compression} payload needs {} bytes, entry holds {}",
                        encoded.len(),
                        payload.len()
                    )));
                }
                let mut region = vec![0u8; payload.len()];
                region[..encoded.len()].copy_from_slice(&encoded);
                Some(region)
            };
            (scan.matched, new_payload)
        };

        for id in &matched {
            ids.remove(id);
        }

        let Some(region) = new_payload else {
            return Ok(None);
        };
        let changed = diff_range(&entry[1..], &region).map(|r| r.start + 1..r.end + 1);
        if let Some(range) = &changed {
            entry[range.clone()].copy_from_slice(&region[range.start - 1..range.end - 1]);
        }
        debug!(matched = matched.len(), changed = ?changed, "pruned entry");
        Ok(changed)
    }
}

/// Raw trace-sequence encoding (no envelope).
#[must_use]
pub fn encode_traces(traces: &[TransactionTrace]) -> Vec<u8> {
    let mut out = Vec::new();
    pack_varuint32(u32::try_from(traces.len()).unwrap_or(u32::MAX), &mut out);
    for t in traces {
        t.pack(&mut out);
    }
    out
}

fn split_entry(entry: &[u8]) -> Result<(CompressionType, &[u8])> {
    let (&tag, payload) = entry
        .split_first()
        .ok_or_else(|| Error::CorruptLog("empty entry".into()))?;
    Ok((CompressionType::try_from(tag)?, payload))
}

struct Scan {
    /// Requested ids found on a trace carrying a partial transaction.
    matched: Vec<TransactionId>,
    /// Spans that still hold data, in increasing offset order.
    spans: Vec<PrunableSpan>,
    /// Offset just past the last trace record.
    logical_end: usize,
}

/// Replay the decode of a trace sequence, collecting prunable spans of the
/// requested ids.
fn scan_prunable(plain: &[u8], ids: &HashSet<TransactionId>) -> Result<Scan> {
    let mut matched = Vec::new();
    let mut spans = Vec::new();
    let mut r = Reader::new(plain);
    let n = r.seq_len()?;
    for _ in 0..n {
        unpack_trace_with(&mut r, &mut |id: &TransactionId, span: PrunableSpan| {
            if ids.contains(id) {
                matched.push(*id);
                if !span.already_pruned {
                    spans.push(span);
                }
            }
        })?;
    }
    Ok(Scan {
        matched,
        spans,
        logical_end: r.position(),
    })
}

/// Copy `plain` with every span replaced by [`EMPTY_PRUNABLE`].
fn compact(plain: &[u8], spans: &[PrunableSpan]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(plain.len());
    let mut cursor = 0usize;
    for s in spans {
        if s.start < cursor || s.end < s.start + EMPTY_PRUNABLE.len() || s.end > plain.len() {
            return Err(Error::CorruptLog(format!(
                "prunable span {}..{} out of bounds (cursor {cursor}, len {})",
                s.start,
                s.end,
                plain.len()
            )));
        }
        out.extend_from_slice(&plain[cursor..s.start]);
        out.extend_from_slice(&EMPTY_PRUNABLE);
        cursor = s.end;
    }
    out.extend_from_slice(&plain[cursor..]);
    Ok(out)
}

/// Smallest range outside of which `a` and `b` agree. Equal lengths assumed.
fn diff_range(a: &[u8], b: &[u8]) -> Option<Range<usize>> {
    let start = a.iter().zip(b).position(|(x, y)| x != y)?;
    let end = a.len() - a.iter().rev().zip(b.iter().rev()).position(|(x, y)| x != y)?;
    Some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Bytes;
    use crate::types::{
        Digest, PartialTransaction, PartialTransactionV0, Signature, TransactionTraceV0,
    };

    fn trace(seed: &[u8], sigs: usize, cfd: usize) -> TransactionTrace {
        TransactionTrace::V0(TransactionTraceV0 {
            id: Digest::of(seed),
            block_num: 7,
            partial: Some(PartialTransaction::V0(PartialTransactionV0 {
                expiration: 99,
                signatures: vec![Signature(Bytes(vec![0xab; 65])); sigs],
                context_free_data: vec![Bytes(vec![0xcd; 10]); cfd],
                ..Default::default()
            })),
            ..Default::default()
        })
    }

    #[test]
    fn empty_when_traces_excluded() {
        let entry =
            TraceConverter::pack_entry(&(), false, &[trace(b"a", 1, 1)], CompressionType::None)
                .unwrap();
        assert_eq!(entry, vec![0, 0]);
        assert!(TraceConverter::unpack(&entry).unwrap().is_empty());
    }

    #[test]
    fn pack_writes_to_any_writer() {
        let mut out = Vec::new();
        let n = TraceConverter::pack(&mut out, &(), true, &[trace(b"a", 1, 0)], CompressionType::Zlib)
            .unwrap();
        assert_eq!(n, out.len());
        assert_eq!(out[0], CompressionType::Zlib.tag());
    }

    #[test]
    fn prune_middle_trace_shifts_followers() {
        let traces = vec![trace(b"a", 1, 1), trace(b"b", 2, 1), trace(b"c", 1, 2)];
        let mut entry =
            TraceConverter::pack_entry(&(), true, &traces, CompressionType::None).unwrap();
        let len = entry.len();

        let mut ids: HashSet<_> = [*traces[1].id()].into();
        let changed = TraceConverter::prune_traces(&mut entry, &mut ids).unwrap();
        assert!(ids.is_empty());
        assert!(changed.is_some());
        assert_eq!(entry.len(), len);

        let back = TraceConverter::unpack(&entry).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[0], traces[0]);
        assert_eq!(back[2], traces[2]);
        let p = back[1].partial_v0().unwrap();
        assert!(p.is_pruned());
        assert_eq!(p.expiration, 99);
        // Tail is zero padding.
        assert!(entry[len - 100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unknown_id_leaves_entry_untouched() {
        let traces = vec![trace(b"a", 1, 1)];
        for ct in [CompressionType::None, CompressionType::Zlib] {
            let mut entry = TraceConverter::pack_entry(&(), true, &traces, ct).unwrap();
            let before = entry.clone();
            let stranger = Digest::of(b"nope");
            let mut ids: HashSet<_> = [stranger].into();
            assert_eq!(TraceConverter::prune_traces(&mut entry, &mut ids).unwrap(), None);
            assert_eq!(entry, before);
            assert!(ids.contains(&stranger));
        }
    }

    #[test]
    fn trace_without_partial_keeps_id_pending() {
        let bare = TransactionTrace::V0(TransactionTraceV0 {
            id: Digest::of(b"implicit"),
            ..Default::default()
        });
        let mut entry =
            TraceConverter::pack_entry(&(), true, &[bare.clone()], CompressionType::None).unwrap();
        let before = entry.clone();
        let mut ids: HashSet<_> = [*bare.id()].into();
        assert_eq!(TraceConverter::prune_traces(&mut entry, &mut ids).unwrap(), None);
        assert_eq!(entry, before);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn zlib_entry_prunes_in_place() {
        let traces = vec![trace(b"a", 2, 1), trace(b"b", 1, 1)];
        let mut entry =
            TraceConverter::pack_entry(&(), true, &traces, CompressionType::Zlib).unwrap();
        let len = entry.len();
        let mut ids: HashSet<_> = [*traces[0].id()].into();
        TraceConverter::prune_traces(&mut entry, &mut ids).unwrap();
        assert_eq!(entry.len(), len);
        assert_eq!(entry[0], CompressionType::Zlib.tag());
        let back = TraceConverter::unpack(&entry).unwrap();
        assert!(back[0].partial_v0().unwrap().is_pruned());
        assert_eq!(back[1], traces[1]);
    }

    #[test]
    fn corrupt_entries_are_reported() {
        assert!(TraceConverter::unpack(&[]).unwrap_err().is_corrupt());
        assert!(TraceConverter::unpack(&[7, 0]).unwrap_err().is_corrupt());
        assert!(TraceConverter::unpack(&[0, 3, 0]).unwrap_err().is_corrupt());
        let mut ids: HashSet<_> = [Digest::of(b"x")].into();
        assert!(TraceConverter::prune_traces(&mut [9, 0], &mut ids)
            .unwrap_err()
            .is_corrupt());
    }

    #[test]
    fn diff_range_bounds() {
        assert_eq!(diff_range(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(diff_range(&[1, 2, 3, 4], &[1, 9, 9, 4]), Some(1..3));
        assert_eq!(diff_range(&[1], &[2]), Some(0..1));
    }
}
