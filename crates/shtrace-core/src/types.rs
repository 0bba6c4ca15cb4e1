//! Canonical data types for transaction traces and the transactions they
//! were produced from.
//!
//! Wire records (`TransactionTrace`, `ActionTrace`, `PartialTransaction`) are
//! explicit sum types with a `varuint32` tag so new variants can be added
//! without touching the layout of existing ones. Everything derives `serde`
//! for export; the on-disk layout is the raw encoding in [`crate::raw`].

use crate::error::{Error, Result};
use crate::raw::{Bytes, Pack, Reader, Unpack, VarUint32};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/* --------------------------------- names --------------------------------- */

const NAME_CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Account / action name: up to 13 characters packed into a `u64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(pub u64);

const fn name_symbol(c: u8) -> u64 {
    match c {
        b'a'..=b'z' => (c - b'a') as u64 + 6,
        b'1'..=b'5' => (c - b'1') as u64 + 1,
        _ => 0,
    }
}

impl Name {
    /// Encode a name from its string form. Characters outside `[.1-5a-z]`
    /// map to `.`; characters past the 13th are ignored.
    #[must_use]
    pub const fn from_ascii(s: &str) -> Self {
        let b = s.as_bytes();
        let mut value: u64 = 0;
        let mut i = 0;
        while i < b.len() && i < 13 {
            let c = name_symbol(b[i]);
            if i < 12 {
                value |= (c & 0x1f) << (64 - 5 * (i + 1));
            } else {
                value |= c & 0x0f;
            }
            i += 1;
        }
        Self(value)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; 13];
        let mut tmp = self.0;
        for i in 0..13 {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - i] = NAME_CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }
        let end = out.iter().rposition(|&c| c != b'.').map_or(0, |p| p + 1);
        f.write_str(std::str::from_utf8(&out[..end]).map_err(|_| fmt::Error)?)
    }
}

/* -------------------------------- digests -------------------------------- */

/// 32-byte digest; rendered as lowercase hex.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(pub [u8; 32]);

/// Transaction ids are digests of the transaction body.
pub type TransactionId = Digest;

impl Digest {
    /// BLAKE3 digest of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

impl FromStr for Digest {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/* ---------------------------- small records ------------------------------ */

/// Opaque signature bytes (key type prefix + signature data).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub Bytes);

/// Typed extension blob attached to a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    /// Extension type id.
    pub ty: u16,
    /// Extension payload.
    pub data: Bytes,
}

/// `actor@permission` authorization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    /// Authorizing account.
    pub actor: Name,
    /// Permission used.
    pub permission: Name,
}

/// A contract action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Contract account.
    pub account: Name,
    /// Action name.
    pub name: Name,
    /// Authorizations.
    pub authorization: Vec<PermissionLevel>,
    /// ABI-encoded action data.
    pub data: Bytes,
}

/// RAM usage change for one account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDelta {
    /// Account charged.
    pub account: Name,
    /// Signed byte delta.
    pub delta: i64,
}

/// Receipt of one executed action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    /// Receiving account.
    pub receiver: Name,
    /// Digest of the action.
    pub act_digest: Digest,
    /// Chain-wide action sequence.
    pub global_sequence: u64,
    /// Per-receiver sequence.
    pub recv_sequence: u64,
}

/// Execution record of a single action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTraceV0 {
    /// 1-based ordinal within the transaction.
    pub action_ordinal: VarUint32,
    /// Ordinal of the action that created this one (0 for top level).
    pub creator_action_ordinal: VarUint32,
    /// Receipt, absent if the action did not complete.
    pub receipt: Option<ActionReceipt>,
    /// Account that executed the action.
    pub receiver: Name,
    /// The action itself.
    pub act: Action,
    /// Whether this was a context-free action.
    pub context_free: bool,
    /// Wall time spent, in microseconds.
    pub elapsed: i64,
    /// Captured console output.
    pub console: String,
    /// RAM deltas caused by this action.
    pub account_ram_deltas: Vec<AccountDelta>,
    /// Exception text, if any.
    pub except: Option<String>,
    /// Contract error code, if any.
    pub error_code: Option<u64>,
}

/// Versioned action trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum ActionTrace {
    /// Only variant today.
    V0(ActionTraceV0),
}

/// Final status of a transaction.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Succeeded, no error handler executed.
    #[default]
    Executed = 0,
    /// Objectively failed, error handler executed.
    SoftFail = 1,
    /// Objectively failed, no error handler.
    HardFail = 2,
    /// Scheduled for delayed execution.
    Delayed = 3,
    /// Expired before execution.
    Expired = 4,
}

/// Receipt header recorded when a transaction is included in a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceiptHeader {
    /// Inclusion status.
    pub status: TransactionStatus,
    /// Billed CPU in microseconds.
    pub cpu_usage_us: u32,
    /// Billed NET in 8-byte words.
    pub net_usage_words: VarUint32,
}

/* -------------------------- partial transaction -------------------------- */

/// Redactable view of a transaction's own signed content.
///
/// `signatures` and `context_free_data` are laid out last so that together
/// they form one contiguous byte span that pruning can replace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialTransactionV0 {
    /// Expiration time (seconds since epoch).
    pub expiration: u32,
    /// Reference block number (low 16 bits).
    pub ref_block_num: u16,
    /// Reference block id prefix.
    pub ref_block_prefix: u32,
    /// NET limit in 8-byte words.
    pub max_net_usage_words: VarUint32,
    /// CPU limit in milliseconds.
    pub max_cpu_usage_ms: u8,
    /// Execution delay in seconds.
    pub delay_sec: VarUint32,
    /// Transaction extensions.
    pub transaction_extensions: Vec<Extension>,
    /// Signatures; empty once pruned.
    pub signatures: Vec<Signature>,
    /// Context-free data segments; empty once pruned.
    pub context_free_data: Vec<Bytes>,
}

impl PartialTransactionV0 {
    /// Whether both prunable fields are already empty.
    #[must_use]
    pub fn is_pruned(&self) -> bool {
        self.signatures.is_empty() && self.context_free_data.is_empty()
    }

    /// Drop signatures and context-free data, keeping every other field.
    pub fn prune(&mut self) {
        self.signatures.clear();
        self.context_free_data.clear();
    }
}

/// Versioned partial transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum PartialTransaction {
    /// Only variant today.
    V0(PartialTransactionV0),
}

impl PartialTransaction {
    /// Access the v0 body.
    #[must_use]
    pub const fn as_v0(&self) -> &PartialTransactionV0 {
        match self {
            Self::V0(p) => p,
        }
    }
}

/* --------------------------- transaction traces -------------------------- */

/// Execution trace of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTraceV0 {
    /// Transaction id.
    pub id: TransactionId,
    /// Block the transaction executed in.
    pub block_num: u32,
    /// Receipt header; `None` if the transaction was not included.
    pub receipt: Option<TransactionReceiptHeader>,
    /// Wall time spent, in microseconds.
    pub elapsed: i64,
    /// NET usage in bytes.
    pub net_usage: u64,
    /// Whether this was a scheduled (deferred) transaction.
    pub scheduled: bool,
    /// Per-action traces.
    pub action_traces: Vec<ActionTrace>,
    /// RAM delta charged to the transaction as a whole.
    pub account_ram_delta: Option<AccountDelta>,
    /// Exception text, if any.
    pub except: Option<String>,
    /// Contract error code, if any.
    pub error_code: Option<u64>,
    /// Trace of the deferred transaction whose failure produced this one.
    pub failed_dtrx_trace: Option<Box<TransactionTrace>>,
    /// Signing / context-free material, attached when the packed
    /// transaction is known.
    pub partial: Option<PartialTransaction>,
}

/// Versioned transaction trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum TransactionTrace {
    /// Only variant today.
    V0(TransactionTraceV0),
}

impl TransactionTrace {
    /// Transaction id.
    #[must_use]
    pub const fn id(&self) -> &TransactionId {
        &self.as_v0().id
    }

    /// Access the v0 body.
    #[must_use]
    pub const fn as_v0(&self) -> &TransactionTraceV0 {
        match self {
            Self::V0(t) => t,
        }
    }

    /// Mutable access to the v0 body.
    pub fn as_v0_mut(&mut self) -> &mut TransactionTraceV0 {
        match self {
            Self::V0(t) => t,
        }
    }

    /// The v0 partial transaction, if one is attached.
    #[must_use]
    pub fn partial_v0(&self) -> Option<&PartialTransactionV0> {
        self.as_v0().partial.as_ref().map(PartialTransaction::as_v0)
    }
}

impl From<TransactionTraceV0> for TransactionTrace {
    fn from(t: TransactionTraceV0) -> Self {
        Self::V0(t)
    }
}

/* ------------------------------ transactions ----------------------------- */

/// Header fields shared by every transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Expiration time (seconds since epoch).
    pub expiration: u32,
    /// Reference block number (low 16 bits).
    pub ref_block_num: u16,
    /// Reference block id prefix.
    pub ref_block_prefix: u32,
    /// NET limit in 8-byte words.
    pub max_net_usage_words: VarUint32,
    /// CPU limit in milliseconds.
    pub max_cpu_usage_ms: u8,
    /// Execution delay in seconds.
    pub delay_sec: VarUint32,
}

/// Transaction body covered by its id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Header.
    pub header: TransactionHeader,
    /// Actions executed without access to chain state.
    pub context_free_actions: Vec<Action>,
    /// Regular actions.
    pub actions: Vec<Action>,
    /// Extensions.
    pub transaction_extensions: Vec<Extension>,
}

/// A signed transaction as received by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
    id: TransactionId,
    /// Signatures over the transaction and its context-free data.
    pub signatures: Vec<Signature>,
    /// Context-free data segments.
    pub context_free_data: Vec<Bytes>,
    /// Transaction body.
    pub trx: Transaction,
}

impl PackedTransaction {
    /// Build a packed transaction, computing its id from the body.
    #[must_use]
    pub fn new(trx: Transaction, signatures: Vec<Signature>, context_free_data: Vec<Bytes>) -> Self {
        let id = Digest::of(&crate::raw::to_vec(&trx));
        Self {
            id,
            signatures,
            context_free_data,
            trx,
        }
    }

    /// Transaction id (digest of the raw transaction body).
    #[inline]
    #[must_use]
    pub const fn id(&self) -> &TransactionId {
        &self.id
    }
}

/// Descriptor of an accepted block: its number and ordered transaction ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBlock {
    /// Block number.
    pub block_num: u32,
    /// Block timestamp (half-second slots).
    pub timestamp: u32,
    /// Transactions in block order.
    pub transactions: Vec<TransactionId>,
}

/* ------------------------------ raw encoding ----------------------------- */

macro_rules! impl_raw_struct {
    ($t:ty { $($f:tt),* $(,)? }) => {
        impl Pack for $t {
            fn pack(&self, out: &mut Vec<u8>) {
                $( self.$f.pack(out); )*
            }
        }

        impl Unpack for $t {
            fn unpack(r: &mut Reader<'_>) -> Result<Self> {
                Ok(Self { $( $f: Unpack::unpack(r)?, )* })
            }
        }
    };
}

impl_raw_struct!(Name { 0 });
impl_raw_struct!(Digest { 0 });
impl_raw_struct!(Signature { 0 });
impl_raw_struct!(Extension { ty, data });
impl_raw_struct!(PermissionLevel { actor, permission });
impl_raw_struct!(Action { account, name, authorization, data });
impl_raw_struct!(AccountDelta { account, delta });
impl_raw_struct!(ActionReceipt { receiver, act_digest, global_sequence, recv_sequence });
impl_raw_struct!(ActionTraceV0 {
    action_ordinal,
    creator_action_ordinal,
    receipt,
    receiver,
    act,
    context_free,
    elapsed,
    console,
    account_ram_deltas,
    except,
    error_code,
});
impl_raw_struct!(TransactionReceiptHeader { status, cpu_usage_us, net_usage_words });
impl_raw_struct!(PartialTransactionV0 {
    expiration,
    ref_block_num,
    ref_block_prefix,
    max_net_usage_words,
    max_cpu_usage_ms,
    delay_sec,
    transaction_extensions,
    signatures,
    context_free_data,
});
impl_raw_struct!(TransactionHeader {
    expiration,
    ref_block_num,
    ref_block_prefix,
    max_net_usage_words,
    max_cpu_usage_ms,
    delay_sec,
});
impl_raw_struct!(Transaction {
    header,
    context_free_actions,
    actions,
    transaction_extensions,
});

impl Pack for TransactionStatus {
    fn pack(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }
}

impl Unpack for TransactionStatus {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        Ok(match u8::unpack(r)? {
            0 => Self::Executed,
            1 => Self::SoftFail,
            2 => Self::HardFail,
            3 => Self::Delayed,
            4 => Self::Expired,
            s => return Err(Error::corrupt(format!("unknown transaction status {s}"))),
        })
    }
}

fn unknown_variant(what: &str, tag: u32) -> Error {
    Error::corrupt(format!("unknown {what} variant {tag}"))
}

impl Pack for ActionTrace {
    fn pack(&self, out: &mut Vec<u8>) {
        match self {
            Self::V0(a) => {
                VarUint32(0).pack(out);
                a.pack(out);
            }
        }
    }
}

impl Unpack for ActionTrace {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        match r.varuint32()? {
            0 => Ok(Self::V0(ActionTraceV0::unpack(r)?)),
            t => Err(unknown_variant("action_trace", t)),
        }
    }
}

impl Pack for PartialTransaction {
    fn pack(&self, out: &mut Vec<u8>) {
        match self {
            Self::V0(p) => {
                VarUint32(0).pack(out);
                p.pack(out);
            }
        }
    }
}

impl Unpack for PartialTransaction {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        match r.varuint32()? {
            0 => Ok(Self::V0(PartialTransactionV0::unpack(r)?)),
            t => Err(unknown_variant("partial_transaction", t)),
        }
    }
}

/// Byte span `[start, end)` holding the `signatures` and
/// `context_free_data` encodings of one partial transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PrunableSpan {
    pub start: usize,
    pub end: usize,
    pub already_pruned: bool,
}

/// Decode a trace, reporting the prunable span of every partial transaction
/// encountered (including the one nested in `failed_dtrx_trace`) to `visit`.
///
/// This is the single decode path: [`Unpack`] for [`TransactionTrace`] calls
/// it with a no-op visitor, and the pruner uses it to locate spans.
pub(crate) fn unpack_trace_with(
    r: &mut Reader<'_>,
    visit: &mut dyn FnMut(&TransactionId, PrunableSpan),
) -> Result<TransactionTrace> {
    unpack_trace_at(r, visit, 0)
}

/// Deepest `failed_dtrx_trace` chain accepted when decoding. An `onerror`
/// trace wraps one failed deferred trace, which never wraps another.
pub const MAX_TRACE_NESTING: usize = 2;

fn unpack_trace_at(
    r: &mut Reader<'_>,
    visit: &mut dyn FnMut(&TransactionId, PrunableSpan),
    depth: usize,
) -> Result<TransactionTrace> {
    let tag = r.varuint32()?;
    if tag != 0 {
        return Err(unknown_variant("transaction_trace", tag));
    }

    let id = TransactionId::unpack(r)?;
    let block_num = u32::unpack(r)?;
    let receipt = Unpack::unpack(r)?;
    let elapsed = i64::unpack(r)?;
    let net_usage = u64::unpack(r)?;
    let scheduled = bool::unpack(r)?;
    let action_traces = Unpack::unpack(r)?;
    let account_ram_delta = Unpack::unpack(r)?;
    let except = Unpack::unpack(r)?;
    let error_code = Unpack::unpack(r)?;

    let failed_dtrx_trace = if bool::unpack(r)? {
        if depth >= MAX_TRACE_NESTING {
            return Err(Error::CorruptLog(format!(
                "failed_dtrx_trace nested deeper than {MAX_TRACE_NESTING}"
            )));
        }
        Some(Box::new(unpack_trace_at(r, visit, depth + 1)?))
    } else {
        None
    };

    let partial = if bool::unpack(r)? {
        let ptag = r.varuint32()?;
        if ptag != 0 {
            return Err(unknown_variant("partial_transaction", ptag));
        }
        let expiration = u32::unpack(r)?;
        let ref_block_num = u16::unpack(r)?;
        let ref_block_prefix = u32::unpack(r)?;
        let max_net_usage_words = VarUint32::unpack(r)?;
        let max_cpu_usage_ms = u8::unpack(r)?;
        let delay_sec = VarUint32::unpack(r)?;
        let transaction_extensions = Unpack::unpack(r)?;
        let start = r.position();
        let signatures: Vec<Signature> = Unpack::unpack(r)?;
        let context_free_data: Vec<Bytes> = Unpack::unpack(r)?;
        let span = PrunableSpan {
            start,
            end: r.position(),
            already_pruned: signatures.is_empty() && context_free_data.is_empty(),
        };
        visit(&id, span);
        Some(PartialTransaction::V0(PartialTransactionV0 {
            expiration,
            ref_block_num,
            ref_block_prefix,
            max_net_usage_words,
            max_cpu_usage_ms,
            delay_sec,
            transaction_extensions,
            signatures,
            context_free_data,
        }))
    } else {
        None
    };

    Ok(TransactionTrace::V0(TransactionTraceV0 {
        id,
        block_num,
        receipt,
        elapsed,
        net_usage,
        scheduled,
        action_traces,
        account_ram_delta,
        except,
        error_code,
        failed_dtrx_trace,
        partial,
    }))
}

impl Pack for TransactionTrace {
    fn pack(&self, out: &mut Vec<u8>) {
        let Self::V0(t) = self;
        VarUint32(0).pack(out);
        t.id.pack(out);
        t.block_num.pack(out);
        t.receipt.pack(out);
        t.elapsed.pack(out);
        t.net_usage.pack(out);
        t.scheduled.pack(out);
        t.action_traces.pack(out);
        t.account_ram_delta.pack(out);
        t.except.pack(out);
        t.error_code.pack(out);
        t.failed_dtrx_trace.pack(out);
        t.partial.pack(out);
    }
}

impl Unpack for TransactionTrace {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        unpack_trace_with(r, &mut |_: &TransactionId, _: PrunableSpan| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{from_slice, to_vec};

    #[test]
    fn name_roundtrip_display() {
        for s in ["eosio", "onblock", "active", "alice.token", "a12345", "zzzzzzzzzzzzj"] {
            assert_eq!(Name::from_ascii(s).to_string(), s);
        }
        assert_eq!(Name::from_ascii("").0, 0);
        assert_eq!(Name::from_ascii("").to_string(), "");
    }

    #[test]
    fn digest_hex_parse() {
        let d = Digest::of(b"hello");
        let s = d.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(s.parse::<Digest>().unwrap(), d);
        assert!("abc".parse::<Digest>().is_err());
    }

    #[test]
    fn packed_transaction_id_binds_body() {
        let mut trx = Transaction::default();
        let a = PackedTransaction::new(trx.clone(), vec![], vec![]);
        trx.header.expiration = 1;
        let b = PackedTransaction::new(trx, vec![], vec![]);
        assert_ne!(a.id(), b.id());

        // Signatures are not part of the id.
        let c = PackedTransaction::new(
            a.trx.clone(),
            vec![Signature(Bytes(vec![1; 65]))],
            vec![Bytes(vec![2; 4])],
        );
        assert_eq!(a.id(), c.id());
    }

    #[test]
    fn nested_failed_trace_roundtrip_and_spans() {
        let inner = TransactionTrace::V0(TransactionTraceV0 {
            id: Digest::of(b"inner"),
            partial: Some(PartialTransaction::V0(PartialTransactionV0 {
                signatures: vec![Signature(Bytes(vec![9; 65]))],
                ..Default::default()
            })),
            ..Default::default()
        });
        let outer = TransactionTrace::V0(TransactionTraceV0 {
            id: Digest::of(b"outer"),
            failed_dtrx_trace: Some(Box::new(inner.clone())),
            ..Default::default()
        });

        let bytes = to_vec(&outer);
        assert_eq!(from_slice::<TransactionTrace>(&bytes).unwrap(), outer);

        let mut seen = Vec::new();
        unpack_trace_with(&mut Reader::new(&bytes), &mut |id: &TransactionId, span: PrunableSpan| {
            seen.push((*id, span));
        })
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, *inner.id());
        assert!(!seen[0].1.already_pruned);
        // signatures (1 + 1 + 65) followed by empty context-free data (1)
        assert_eq!(seen[0].1.end - seen[0].1.start, 1 + 1 + 65 + 1);
    }

    #[test]
    fn unknown_trace_variant_is_corrupt() {
        assert!(from_slice::<TransactionTrace>(&[5]).unwrap_err().is_corrupt());
    }
}
