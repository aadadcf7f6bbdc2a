use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use courier_types::EnvelopeId;

use crate::error::ClientResult;

/// Confirmation receipt for a ledger submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Connection to a contract-backed blockchain ledger node.
///
/// `submit_envelope` blocks until the transaction is confirmed; callers that
/// need bounded latency must impose their own timeout at the call site.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit serialized envelope bytes keyed by envelope id and wait for
    /// confirmation.
    async fn submit_envelope(&self, id: EnvelopeId, bytes: Vec<u8>) -> ClientResult<TxReceipt>;

    /// Read-only contract lookup by envelope id.
    async fn get_envelope(&self, id: EnvelopeId) -> ClientResult<Option<Vec<u8>>>;

    /// Read-only contract existence check.
    async fn envelope_exists(&self, id: EnvelopeId) -> ClientResult<bool>;
}

/// In-memory chain simulator: monotonic block numbers, deterministic
/// transaction hashes, flat gas model.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<EnvelopeId, Vec<u8>>>,
    block_height: AtomicU64,
}

/// Base gas charged per submission before the per-byte cost.
const BASE_GAS: u64 = 21_000;

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current chain height.
    pub fn block_height(&self) -> u64 {
        self.block_height.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit_envelope(&self, id: EnvelopeId, bytes: Vec<u8>) -> ClientResult<TxReceipt> {
        let gas_used = BASE_GAS + bytes.len() as u64 * 16;
        // Transaction hash is derived from the submitted bytes so repeated
        // submissions of the same envelope confirm with the same hash.
        let transaction_hash = EnvelopeId::of(&bytes).to_hex();
        self.entries.write().expect("lock poisoned").insert(id, bytes);
        let block_number = self.block_height.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TxReceipt {
            transaction_hash,
            block_number,
            gas_used,
        })
    }

    async fn get_envelope(&self, id: EnvelopeId) -> ClientResult<Option<Vec<u8>>> {
        Ok(self.entries.read().expect("lock poisoned").get(&id).cloned())
    }

    async fn envelope_exists(&self, id: EnvelopeId) -> ClientResult<bool> {
        Ok(self.entries.read().expect("lock poisoned").contains_key(&id))
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("block_height", &self.block_height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_then_get() {
        let ledger = MemoryLedger::new();
        let id = EnvelopeId::of(b"envelope");
        let receipt = ledger.submit_envelope(id, b"envelope".to_vec()).await.unwrap();
        assert_eq!(receipt.block_number, 1);
        assert!(receipt.gas_used > BASE_GAS);

        assert_eq!(
            ledger.get_envelope(id).await.unwrap(),
            Some(b"envelope".to_vec())
        );
        assert!(ledger.envelope_exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn block_height_is_monotonic() {
        let ledger = MemoryLedger::new();
        let r1 = ledger
            .submit_envelope(EnvelopeId::of(b"a"), b"a".to_vec())
            .await
            .unwrap();
        let r2 = ledger
            .submit_envelope(EnvelopeId::of(b"b"), b"b".to_vec())
            .await
            .unwrap();
        assert!(r2.block_number > r1.block_number);
    }

    #[tokio::test]
    async fn identical_bytes_confirm_with_same_tx_hash() {
        let ledger = MemoryLedger::new();
        let id = EnvelopeId::of(b"x");
        let r1 = ledger.submit_envelope(id, b"x".to_vec()).await.unwrap();
        let r2 = ledger.submit_envelope(id, b"x".to_vec()).await.unwrap();
        assert_eq!(r1.transaction_hash, r2.transaction_hash);
    }

    #[tokio::test]
    async fn missing_envelope_is_none_not_error() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.get_envelope(EnvelopeId::of(b"missing")).await.unwrap(), None);
        assert!(!ledger.envelope_exists(EnvelopeId::of(b"missing")).await.unwrap());
    }
}
