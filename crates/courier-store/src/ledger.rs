use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use courier_clients::LedgerClient;
use courier_types::{ContentHash, Envelope, EnvelopeId};

use crate::error::{EnvelopeStoreError, StoreResult};
use crate::traits::{BackendInfo, EnvelopeStore, STORED_AT_KEY};

/// Provenance metadata keys written back after a confirmed submission.
pub const TRANSACTION_HASH_KEY: &str = "transaction_hash";
pub const BLOCK_NUMBER_KEY: &str = "block_number";
pub const GAS_USED_KEY: &str = "gas_used";

/// Envelope store over an immutable contract-backed ledger.
///
/// `store` submits the serialized envelope, waits for confirmation, and
/// writes chain provenance back into the caller's envelope metadata. The id
/// is derived from the bytes as submitted, so the writeback never changes
/// what the chain holds.
///
/// The chain is append-only and unindexed: `delete` is a permanent
/// capability gap, and `find_by_*`/`list_by_sender` fail with
/// `UnsupportedQuery` rather than silently returning nothing.
pub struct LedgerEnvelopeStore {
    client: Arc<dyn LedgerClient>,
}

impl LedgerEnvelopeStore {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    fn unsupported_query(&self, query: &'static str) -> EnvelopeStoreError {
        EnvelopeStoreError::UnsupportedQuery {
            backend: "ledger",
            query,
        }
    }
}

#[async_trait]
impl EnvelopeStore for LedgerEnvelopeStore {
    async fn store(&self, envelope: &mut Envelope) -> StoreResult<EnvelopeId> {
        let id = envelope.id()?;
        let bytes = envelope.to_bytes()?;
        let size = bytes.len();

        let receipt = self.client.submit_envelope(id, bytes).await?;
        info!(
            id = %id.short_hex(),
            tx = %receipt.transaction_hash,
            block = receipt.block_number,
            "envelope confirmed on ledger"
        );

        envelope.metadata.insert(
            TRANSACTION_HASH_KEY.into(),
            receipt.transaction_hash.clone(),
        );
        envelope
            .metadata
            .insert(BLOCK_NUMBER_KEY.into(), receipt.block_number.to_string());
        envelope
            .metadata
            .insert(GAS_USED_KEY.into(), receipt.gas_used.to_string());

        debug!(id = %id.short_hex(), size, "chain provenance written back");
        Ok(id)
    }

    async fn retrieve(&self, id: &EnvelopeId) -> StoreResult<Envelope> {
        let Some(bytes) = self.client.get_envelope(*id).await? else {
            return Err(EnvelopeStoreError::not_found(id, self.name()));
        };
        Ok(Envelope::from_bytes(&bytes)?)
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
            backend: "ledger",
            operation: "delete",
        })
    }

    async fn exists(&self, id: &EnvelopeId) -> StoreResult<bool> {
        Ok(self.client.envelope_exists(*id).await?)
    }

    async fn envelope_metadata(&self, id: &EnvelopeId) -> StoreResult<BTreeMap<String, String>> {
        // The chain holds only envelope bytes; metadata is reconstructed
        // from the stored envelope itself.
        let envelope = self.retrieve(id).await?;
        let mut metadata = envelope.metadata;
        metadata
            .entry(STORED_AT_KEY.to_string())
            .or_insert_with(|| Utc::now().to_rfc3339());
        Ok(metadata)
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo::new(self.name(), "ledger").with_detail("mutability", "append-only")
    }

    fn name(&self) -> &str {
        "ledger"
    }
}

impl std::fmt::Debug for LedgerEnvelopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEnvelopeStore").finish()
    }
}
