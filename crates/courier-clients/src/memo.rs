use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use courier_types::EnvelopeId;

use crate::error::ClientResult;

/// One transaction memo: a type tag and raw data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memo {
    pub memo_type: String,
    pub data: Vec<u8>,
}

/// Confirmation receipt for a memo submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoReceipt {
    pub transaction_hash: String,
    pub ledger_index: u64,
}

/// Connection to an append-only ledger that carries data in transaction
/// memos.
///
/// There is no key-value lookup: a stored memo is only reachable through the
/// transaction hash the submission returned.
#[async_trait]
pub trait MemoLedgerClient: Send + Sync {
    /// Submit a transaction carrying the memo and wait for validation.
    async fn submit_memo(&self, memo: Memo) -> ClientResult<MemoReceipt>;

    /// The memos attached to a validated transaction, or `None` if the
    /// transaction is unknown.
    async fn transaction_memos(&self, tx_hash: &str) -> ClientResult<Option<Vec<Memo>>>;
}

/// In-memory memo ledger simulator.
#[derive(Default)]
pub struct MemoryMemoLedger {
    transactions: RwLock<HashMap<String, Vec<Memo>>>,
    ledger_index: AtomicU64,
}

impl MemoryMemoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of validated transactions.
    pub fn transaction_count(&self) -> usize {
        self.transactions.read().expect("lock poisoned").len()
    }
}

#[async_trait]
impl MemoLedgerClient for MemoryMemoLedger {
    async fn submit_memo(&self, memo: Memo) -> ClientResult<MemoReceipt> {
        let ledger_index = self.ledger_index.fetch_add(1, Ordering::SeqCst) + 1;
        // Hash covers the memo payload and the ledger position, so two
        // submissions of identical data still get distinct transactions.
        let mut seed = memo.data.clone();
        seed.extend_from_slice(&ledger_index.to_be_bytes());
        let transaction_hash = EnvelopeId::of(&seed).to_hex();

        self.transactions
            .write()
            .expect("lock poisoned")
            .insert(transaction_hash.clone(), vec![memo]);

        Ok(MemoReceipt {
            transaction_hash,
            ledger_index,
        })
    }

    async fn transaction_memos(&self, tx_hash: &str) -> ClientResult<Option<Vec<Memo>>> {
        Ok(self
            .transactions
            .read()
            .expect("lock poisoned")
            .get(tx_hash)
            .cloned())
    }
}

impl std::fmt::Debug for MemoryMemoLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMemoLedger")
            .field("transaction_count", &self.transaction_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memo(data: &[u8]) -> Memo {
        Memo {
            memo_type: "courier/envelope".into(),
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn submit_then_read_back() {
        let ledger = MemoryMemoLedger::new();
        let receipt = ledger.submit_memo(memo(b"payload")).await.unwrap();
        assert_eq!(receipt.ledger_index, 1);

        let memos = ledger
            .transaction_memos(&receipt.transaction_hash)
            .await
            .unwrap()
            .expect("transaction should exist");
        assert_eq!(memos.len(), 1);
        assert_eq!(memos[0].data, b"payload");
    }

    #[tokio::test]
    async fn identical_memos_get_distinct_transactions() {
        let ledger = MemoryMemoLedger::new();
        let r1 = ledger.submit_memo(memo(b"same")).await.unwrap();
        let r2 = ledger.submit_memo(memo(b"same")).await.unwrap();
        assert_ne!(r1.transaction_hash, r2.transaction_hash);
        assert_eq!(ledger.transaction_count(), 2);
    }

    #[tokio::test]
    async fn unknown_transaction_is_none() {
        let ledger = MemoryMemoLedger::new();
        assert_eq!(ledger.transaction_memos("unknown").await.unwrap(), None);
    }
}
