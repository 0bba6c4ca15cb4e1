//! Build the redactable [`PartialTransaction`] view of a packed transaction.

use crate::types::{PackedTransaction, PartialTransaction, PartialTransactionV0};

/// Produces partial transactions from packed transactions.
///
/// Stateless; exists so callers have one named seam for the conversion.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartialTransactionBuilder;

impl PartialTransactionBuilder {
    /// Copy the header fields, extensions, signatures, and context-free data
    /// of `ptrx` verbatim. Nothing is pruned here.
    #[must_use]
    pub fn build(ptrx: &PackedTransaction) -> PartialTransaction {
        PartialTransaction::V0(PartialTransactionV0::from(ptrx))
    }
}

impl From<&PackedTransaction> for PartialTransactionV0 {
    fn from(ptrx: &PackedTransaction) -> Self {
        let h = &ptrx.trx.header;
        Self {
            expiration: h.expiration,
            ref_block_num: h.ref_block_num,
            ref_block_prefix: h.ref_block_prefix,
            max_net_usage_words: h.max_net_usage_words,
            max_cpu_usage_ms: h.max_cpu_usage_ms,
            delay_sec: h.delay_sec,
            transaction_extensions: ptrx.trx.transaction_extensions.clone(),
            signatures: ptrx.signatures.clone(),
            context_free_data: ptrx.context_free_data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{Bytes, VarUint32};
    use crate::types::{Extension, Signature, Transaction, TransactionHeader};

    #[test]
    fn copies_every_field() {
        let trx = Transaction {
            header: TransactionHeader {
                expiration: 1_700_000_000,
                ref_block_num: 42,
                ref_block_prefix: 0xdead_beef,
                max_net_usage_words: VarUint32(10),
                max_cpu_usage_ms: 5,
                delay_sec: VarUint32(3),
            },
            transaction_extensions: vec![Extension {
                ty: 1,
                data: Bytes(vec![7, 7]),
            }],
            ..Default::default()
        };
        let ptrx = PackedTransaction::new(
            trx,
            vec![Signature(Bytes(vec![1; 65])), Signature(Bytes(vec![2; 65]))],
            vec![Bytes(b"cfd".to_vec())],
        );

        let PartialTransaction::V0(p) = PartialTransactionBuilder::build(&ptrx);
        assert_eq!(p.expiration, 1_700_000_000);
        assert_eq!(p.ref_block_num, 42);
        assert_eq!(p.ref_block_prefix, 0xdead_beef);
        assert_eq!(p.max_net_usage_words, VarUint32(10));
        assert_eq!(p.max_cpu_usage_ms, 5);
        assert_eq!(p.delay_sec, VarUint32(3));
        assert_eq!(p.transaction_extensions.len(), 1);
        assert_eq!(p.signatures.len(), 2);
        assert_eq!(p.context_free_data, vec![Bytes(b"cfd".to_vec())]);
        assert!(!p.is_pruned());
    }
}
