use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use courier_clients::{Memo, MemoLedgerClient};
use courier_types::{ContentHash, Envelope, EnvelopeId};

use crate::error::{EnvelopeStoreError, StoreResult};
use crate::traits::{BackendInfo, EnvelopeStore, STORED_AT_KEY};

/// Hard cap on serialized envelope size, imposed by the memo field.
pub const MEMO_CAP: u64 = 1024;

/// Memo type tag distinguishing envelope memos from other traffic.
pub const ENVELOPE_MEMO_TYPE: &str = "courier/envelope";

/// Provenance metadata keys recorded for a validated submission.
pub const MEMO_TRANSACTION_HASH_KEY: &str = "transaction_hash";
pub const LEDGER_INDEX_KEY: &str = "ledger_index";

/// Envelope store over an append-only memo ledger.
///
/// A memo ledger has no key-value surface: a stored envelope is only
/// reachable through the transaction hash its submission returned.
/// [`MemoEnvelopeStore::retrieve_by_transaction`] is therefore the durable
/// read path. As a convenience, each instance keeps an id-to-transaction
/// index for the envelopes it stored itself, which makes `retrieve` by id
/// work within that instance's lifetime; ids stored elsewhere fail with
/// `UnsupportedOperation`.
///
/// Oversized envelopes are rejected before any network call: the memo field
/// caps serialized size at [`MEMO_CAP`] bytes.
pub struct MemoEnvelopeStore {
    client: Arc<dyn MemoLedgerClient>,
    tx_index: RwLock<HashMap<EnvelopeId, String>>,
    provenance: RwLock<HashMap<EnvelopeId, BTreeMap<String, String>>>,
}

impl MemoEnvelopeStore {
    pub fn new(client: Arc<dyn MemoLedgerClient>) -> Self {
        Self {
            client,
            tx_index: RwLock::new(HashMap::new()),
            provenance: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch an envelope through the transaction that carried it. Works for
    /// any transaction hash, not only ones this instance submitted.
    pub async fn retrieve_by_transaction(&self, tx_hash: &str) -> StoreResult<Envelope> {
        let Some(memos) = self.client.transaction_memos(tx_hash).await? else {
            return Err(EnvelopeStoreError::not_found(tx_hash, self.name()));
        };
        let Some(memo) = memos.iter().find(|m| m.memo_type == ENVELOPE_MEMO_TYPE) else {
            return Err(EnvelopeStoreError::not_found(tx_hash, self.name()));
        };
        Ok(Envelope::from_bytes(&memo.data)?)
    }

    fn unsupported_query(&self, query: &'static str) -> EnvelopeStoreError {
        EnvelopeStoreError::UnsupportedQuery {
            backend: "memo",
            query,
        }
    }
}

#[async_trait]
impl EnvelopeStore for MemoEnvelopeStore {
    async fn store(&self, envelope: &mut Envelope) -> StoreResult<EnvelopeId> {
        let id = envelope.id()?;
        let bytes = envelope.to_bytes()?;
        let size = bytes.len() as u64;
        // Fail before touching the network: the ledger would reject the
        // transaction anyway.
        if size > MEMO_CAP {
            return Err(EnvelopeStoreError::MemoTooLarge {
                size,
                cap: MEMO_CAP,
            });
        }

        let receipt = self
            .client
            .submit_memo(Memo {
                memo_type: ENVELOPE_MEMO_TYPE.to_string(),
                data: bytes,
            })
            .await?;
        info!(
            id = %id.short_hex(),
            tx = %receipt.transaction_hash,
            ledger_index = receipt.ledger_index,
            "envelope memo validated"
        );

        envelope.metadata.insert(
            MEMO_TRANSACTION_HASH_KEY.into(),
            receipt.transaction_hash.clone(),
        );
        envelope
            .metadata
            .insert(LEDGER_INDEX_KEY.into(), receipt.ledger_index.to_string());

        self.tx_index
            .write()
            .expect("lock poisoned")
            .insert(id, receipt.transaction_hash.clone());
        self.provenance.write().expect("lock poisoned").insert(
            id,
            BTreeMap::from([
                (
                    MEMO_TRANSACTION_HASH_KEY.to_string(),
                    receipt.transaction_hash,
                ),
                (LEDGER_INDEX_KEY.to_string(), receipt.ledger_index.to_string()),
                (STORED_AT_KEY.to_string(), Utc::now().to_rfc3339()),
            ]),
        );

        debug!(id = %id.short_hex(), size, "envelope memo indexed locally");
        Ok(id)
    }

    async fn retrieve(&self, id: &EnvelopeId) -> StoreResult<Envelope> {
        let tx_hash = self
            .tx_index
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned();
        match tx_hash {
            Some(tx_hash) => self.retrieve_by_transaction(&tx_hash).await,
            // Without the submitting instance's index there is no way to map
            // an id back to its transaction.
            None => Err(EnvelopeStoreError::UnsupportedOperation {
                backend: "memo",
                operation: "retrieve by id for envelopes stored elsewhere",
            }),
        }
    }

    async fn find_by_content_hash(&self, _hash: &ContentHash) -> StoreResult<Vec<Envelope>> {
        Err(self.unsupported_query("content-hash"))
    }

    async fn find_by_context(&self, _context: &ContentHash) -> StoreResult<Vec<Envelope>> {
        Err(self.unsupported_query("context"))
    }

    async fn list_by_sender(&self, _sender: &str, _limit: usize) -> StoreResult<Vec<Envelope>> {
        Err(self.unsupported_query("sender"))
    }

    async fn delete(&self, _id: &EnvelopeId) -> StoreResult<bool> {
        Err(EnvelopeStoreError::UnsupportedOperation {
            backend: "memo",
            operation: "delete",
        })
    }

    async fn exists(&self, id: &EnvelopeId) -> StoreResult<bool> {
        Ok(self
            .tx_index
            .read()
            .expect("lock poisoned")
            .contains_key(id))
    }

    async fn envelope_metadata(&self, id: &EnvelopeId) -> StoreResult<BTreeMap<String, String>> {
        self.provenance
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| EnvelopeStoreError::not_found(id, self.name()))
    }

    async fn backend_info(&self) -> BackendInfo {
        let indexed = self.tx_index.read().expect("lock poisoned").len() as u64;
        BackendInfo::new(self.name(), "memo")
            .with_detail("memo_cap", MEMO_CAP.to_string())
            .with_detail("locally_indexed", indexed.to_string())
    }

    fn name(&self) -> &str {
        "memo"
    }
}

impl std::fmt::Debug for MemoEnvelopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indexed = self.tx_index.read().expect("lock poisoned").len();
        f.debug_struct("MemoEnvelopeStore")
            .field("locally_indexed", &indexed)
            .finish()
    }
}
