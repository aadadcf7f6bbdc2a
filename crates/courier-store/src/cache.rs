use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use courier_clients::KvClient;
use courier_types::{ContentHash, Envelope, EnvelopeId};

use crate::error::{EnvelopeStoreError, StoreResult};
use crate::traits::{sender_score, BackendInfo, EnvelopeStore, SENDER_KEY, STORED_AT_KEY};

/// Default key prefix for all cache records.
pub const DEFAULT_KEY_PREFIX: &str = "courier";

/// Envelope store over a networked key-value cache.
///
/// Layout under the configured prefix:
///
/// - `{prefix}:envelope:{id}` — serialized envelope, hex-encoded
/// - `{prefix}:meta:{id}` — provenance metadata, JSON
/// - `{prefix}:content:{hash}` — set of envelope ids with that payload hash
/// - `{prefix}:context:{hash}` — set of envelope ids referencing that context
/// - `{prefix}:sender:{sender}` — sorted set of envelope ids, scored by
///   send timestamp
///
/// Secondary indices are written with the primary record. Queries read the
/// index then fetch members; a member whose primary record has vanished is
/// pruned from the index on the spot so the index converges back to the
/// truth, and the miss is logged rather than hidden.
pub struct CacheEnvelopeStore {
    kv: Arc<dyn KvClient>,
    key_prefix: String,
}

impl CacheEnvelopeStore {
    pub fn new(kv: Arc<dyn KvClient>) -> Self {
        Self::with_prefix(kv, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(kv: Arc<dyn KvClient>, key_prefix: impl Into<String>) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn envelope_key(&self, id: &EnvelopeId) -> String {
        format!("{}:envelope:{}", self.key_prefix, id.to_hex())
    }

    fn meta_key(&self, id: &EnvelopeId) -> String {
        format!("{}:meta:{}", self.key_prefix, id.to_hex())
    }

    fn content_key(&self, hash: &ContentHash) -> String {
        format!("{}:content:{}", self.key_prefix, hash.to_hex())
    }

    fn context_key(&self, context: &ContentHash) -> String {
        format!("{}:context:{}", self.key_prefix, context.to_hex())
    }

    fn sender_key(&self, sender: &str) -> String {
        format!("{}:sender:{}", self.key_prefix, sender)
    }

    async fn fetch(&self, id: &EnvelopeId) -> StoreResult<Option<Envelope>> {
        let Some(raw) = self.kv.get(&self.envelope_key(id)).await? else {
            return Ok(None);
        };
        let bytes = hex::decode(&raw).map_err(|e| EnvelopeStoreError::Codec(e.to_string()))?;
        Ok(Some(Envelope::from_bytes(&bytes)?))
    }

    /// Resolve ids from a membership set, pruning entries whose primary
    /// record is gone.
    async fn resolve_set(&self, index_key: &str) -> StoreResult<Vec<Envelope>> {
        let mut envelopes = Vec::new();
        for member in self.kv.set_members(index_key).await? {
            let Ok(id) = EnvelopeId::from_hex(&member) else {
                warn!(index = index_key, member, "pruning unparseable index member");
                self.kv.set_remove(index_key, &member).await?;
                continue;
            };
            match self.fetch(&id).await? {
                Some(envelope) => envelopes.push(envelope),
                None => {
                    warn!(
                        index = index_key,
                        id = %id.short_hex(),
                        "pruning stale index member"
                    );
                    self.kv.set_remove(index_key, &member).await?;
                }
            }
        }
        Ok(envelopes)
    }
}

#[async_trait]
impl EnvelopeStore for CacheEnvelopeStore {
    async fn store(&self, envelope: &mut Envelope) -> StoreResult<EnvelopeId> {
        let id = envelope.id()?;
        let bytes = envelope.to_bytes()?;
        self.kv
            .put(&self.envelope_key(&id), hex::encode(bytes).into_bytes())
            .await?;

        let meta = BTreeMap::from([(STORED_AT_KEY.to_string(), Utc::now().to_rfc3339())]);
        let meta_json =
            serde_json::to_vec(&meta).map_err(|e| EnvelopeStoreError::Codec(e.to_string()))?;
        self.kv.put(&self.meta_key(&id), meta_json).await?;

        let id_hex = id.to_hex();
        self.kv
            .set_add(&self.content_key(&envelope.content_hash), &id_hex)
            .await?;
        for context in &envelope.public_references {
            self.kv
                .set_add(&self.context_key(context), &id_hex)
                .await?;
        }
        if let Some(sender) = envelope.metadata.get(SENDER_KEY) {
            self.kv
                .sorted_add(&self.sender_key(sender), &id_hex, sender_score(envelope))
                .await?;
        }

        debug!(id = %id.short_hex(), "envelope stored in cache");
        Ok(id)
    }

    async fn retrieve(&self, id: &EnvelopeId) -> StoreResult<Envelope> {
        self.fetch(id)
            .await?
            .ok_or_else(|| EnvelopeStoreError::not_found(id, self.name()))
    }

    async fn find_by_content_hash(&self, hash: &ContentHash) -> StoreResult<Vec<Envelope>> {
        self.resolve_set(&self.content_key(hash)).await
    }

    async fn find_by_context(&self, context: &ContentHash) -> StoreResult<Vec<Envelope>> {
        self.resolve_set(&self.context_key(context)).await
    }

    async fn list_by_sender(&self, sender: &str, limit: usize) -> StoreResult<Vec<Envelope>> {
        let index_key = self.sender_key(sender);
        let mut envelopes = Vec::new();
        for member in self.kv.sorted_rev_range(&index_key, limit).await? {
            let Ok(id) = EnvelopeId::from_hex(&member) else {
                warn!(index = %index_key, member, "pruning unparseable index member");
                self.kv.sorted_remove(&index_key, &member).await?;
                continue;
            };
            match self.fetch(&id).await? {
                Some(envelope) => envelopes.push(envelope),
                None => {
                    warn!(
                        index = %index_key,
                        id = %id.short_hex(),
                        "pruning stale index member"
                    );
                    self.kv.sorted_remove(&index_key, &member).await?;
                }
            }
        }
        Ok(envelopes)
    }

    async fn delete(&self, id: &EnvelopeId) -> StoreResult<bool> {
        let Some(envelope) = self.fetch(id).await? else {
            return Ok(false);
        };

        self.kv.remove(&self.envelope_key(id)).await?;
        self.kv.remove(&self.meta_key(id)).await?;

        let id_hex = id.to_hex();
        self.kv
            .set_remove(&self.content_key(&envelope.content_hash), &id_hex)
            .await?;
        for context in &envelope.public_references {
            self.kv
                .set_remove(&self.context_key(context), &id_hex)
                .await?;
        }
        if let Some(sender) = envelope.metadata.get(SENDER_KEY) {
            self.kv
                .sorted_remove(&self.sender_key(sender), &id_hex)
                .await?;
        }

        debug!(id = %id.short_hex(), "envelope deleted from cache");
        Ok(true)
    }

    async fn exists(&self, id: &EnvelopeId) -> StoreResult<bool> {
        Ok(self.kv.exists(&self.envelope_key(id)).await?)
    }

    async fn envelope_metadata(&self, id: &EnvelopeId) -> StoreResult<BTreeMap<String, String>> {
        let Some(raw) = self.kv.get(&self.meta_key(id)).await? else {
            return Err(EnvelopeStoreError::not_found(id, self.name()));
        };
        serde_json::from_slice(&raw).map_err(|e| EnvelopeStoreError::Codec(e.to_string()))
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo::new(self.name(), "cache").with_detail("key_prefix", &self.key_prefix)
    }

    fn name(&self) -> &str {
        "cache"
    }
}

impl std::fmt::Debug for CacheEnvelopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEnvelopeStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}
