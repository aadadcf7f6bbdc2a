use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use courier_types::{ContentHash, Envelope, EnvelopeId};

use crate::error::{EnvelopeStoreError, StoreResult};
use crate::traits::{sender_score, BackendInfo, EnvelopeStore, SENDER_KEY, STORED_AT_KEY};

#[derive(Default)]
struct Indexes {
    by_content_hash: HashMap<ContentHash, BTreeSet<EnvelopeId>>,
    by_context: HashMap<ContentHash, BTreeSet<EnvelopeId>>,
    by_sender: HashMap<String, Vec<(f64, EnvelopeId)>>,
}

impl Indexes {
    fn insert(&mut self, id: EnvelopeId, envelope: &Envelope) {
        self.by_content_hash
            .entry(envelope.content_hash)
            .or_default()
            .insert(id);
        for context in &envelope.public_references {
            self.by_context.entry(*context).or_default().insert(id);
        }
        if let Some(sender) = envelope.metadata.get(SENDER_KEY) {
            let entries = self.by_sender.entry(sender.clone()).or_default();
            if !entries.iter().any(|(_, existing)| *existing == id) {
                entries.push((sender_score(envelope), id));
            }
        }
    }

    fn remove(&mut self, id: &EnvelopeId, envelope: &Envelope) {
        if let Some(ids) = self.by_content_hash.get_mut(&envelope.content_hash) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_content_hash.remove(&envelope.content_hash);
            }
        }
        for context in &envelope.public_references {
            if let Some(ids) = self.by_context.get_mut(context) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_context.remove(context);
                }
            }
        }
        if let Some(sender) = envelope.metadata.get(SENDER_KEY) {
            if let Some(entries) = self.by_sender.get_mut(sender) {
                entries.retain(|(_, existing)| existing != id);
                if entries.is_empty() {
                    self.by_sender.remove(sender);
                }
            }
        }
    }
}

struct Inner {
    envelopes: HashMap<EnvelopeId, Envelope>,
    metadata: HashMap<EnvelopeId, BTreeMap<String, String>>,
    indexes: Indexes,
}

/// In-memory, HashMap-based envelope store.
///
/// Intended for tests and embedding. Envelopes are held behind a `RwLock`
/// and cloned on read/write. Maintains the same secondary indices as the
/// cache backend so query behavior matches across the two.
pub struct MemoryEnvelopeStore {
    inner: RwLock<Inner>,
}

impl MemoryEnvelopeStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                envelopes: HashMap::new(),
                metadata: HashMap::new(),
                indexes: Indexes::default(),
            }),
        }
    }

    /// Number of envelopes currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").envelopes.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .expect("lock poisoned")
            .envelopes
            .is_empty()
    }

    /// Remove all envelopes.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.envelopes.clear();
        inner.metadata.clear();
        inner.indexes = Indexes::default();
    }
}

impl Default for MemoryEnvelopeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvelopeStore for MemoryEnvelopeStore {
    async fn store(&self, envelope: &mut Envelope) -> StoreResult<EnvelopeId> {
        let id = envelope.id()?;
        let mut inner = self.inner.write().expect("lock poisoned");
        // Idempotent: content addressing maps the same bytes to the same id.
        if !inner.envelopes.contains_key(&id) {
            inner.indexes.insert(id, envelope);
            inner.envelopes.insert(id, envelope.clone());
            inner.metadata.insert(
                id,
                BTreeMap::from([(STORED_AT_KEY.to_string(), Utc::now().to_rfc3339())]),
            );
        }
        debug!(id = %id.short_hex(), "envelope stored in memory");
        Ok(id)
    }

    async fn retrieve(&self, id: &EnvelopeId) -> StoreResult<Envelope> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .envelopes
            .get(id)
            .cloned()
            .ok_or_else(|| EnvelopeStoreError::not_found(id, self.name()))
    }

    async fn find_by_content_hash(&self, hash: &ContentHash) -> StoreResult<Vec<Envelope>> {
        let inner = self.inner.read().expect("lock poisoned");
        let Some(ids) = inner.indexes.by_content_hash.get(hash) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.envelopes.get(id).cloned())
            .collect())
    }

    async fn find_by_context(&self, context: &ContentHash) -> StoreResult<Vec<Envelope>> {
        let inner = self.inner.read().expect("lock poisoned");
        let Some(ids) = inner.indexes.by_context.get(context) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.envelopes.get(id).cloned())
            .collect())
    }

    async fn list_by_sender(&self, sender: &str, limit: usize) -> StoreResult<Vec<Envelope>> {
        let inner = self.inner.read().expect("lock poisoned");
        let Some(entries) = inner.indexes.by_sender.get(sender) else {
            return Ok(Vec::new());
        };
        let mut ordered: Vec<&(f64, EnvelopeId)> = entries.iter().collect();
        // Newest first; id ordering breaks score ties deterministically.
        ordered.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(ordered
            .into_iter()
            .take(limit)
            .filter_map(|(_, id)| inner.envelopes.get(id).cloned())
            .collect())
    }

    async fn delete(&self, id: &EnvelopeId) -> StoreResult<bool> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let Some(envelope) = inner.envelopes.remove(id) else {
            return Ok(false);
        };
        inner.metadata.remove(id);
        inner.indexes.remove(id, &envelope);
        debug!(id = %id.short_hex(), "envelope deleted from memory");
        Ok(true)
    }

    async fn exists(&self, id: &EnvelopeId) -> StoreResult<bool> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.envelopes.contains_key(id))
    }

    async fn envelope_metadata(&self, id: &EnvelopeId) -> StoreResult<BTreeMap<String, String>> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .metadata
            .get(id)
            .cloned()
            .ok_or_else(|| EnvelopeStoreError::not_found(id, self.name()))
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo::new(self.name(), "memory").with_count(self.len() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryEnvelopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEnvelopeStore")
            .field("envelope_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use courier_types::{EncryptionMode, MessageType};

    use crate::traits::TIMESTAMP_KEY;

    use super::*;

    fn envelope_with(metadata: &[(&str, &str)], payload: &[u8]) -> Envelope {
        Envelope::new(
            MessageType::CoreMessage,
            EncryptionMode::None,
            payload.to_vec(),
            metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn store_and_retrieve_round_trip() {
        let store = MemoryEnvelopeStore::new();
        let mut envelope = envelope_with(&[], b"payload");
        let id = store.store(&mut envelope).await.unwrap();

        assert_eq!(store.retrieve(&id).await.unwrap(), envelope);
        assert!(store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn storing_identical_bytes_is_idempotent() {
        let store = MemoryEnvelopeStore::new();
        let mut a = envelope_with(&[], b"same");
        let mut b = envelope_with(&[], b"same");
        let id_a = store.store(&mut a).await.unwrap();
        let id_b = store.store(&mut b).await.unwrap();

        assert_eq!(id_a, id_b);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_envelope_is_not_found() {
        let store = MemoryEnvelopeStore::new();
        let id = envelope_with(&[], b"never stored").id().unwrap();
        let err = store.retrieve(&id).await.unwrap_err();
        assert!(matches!(err, EnvelopeStoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn find_by_content_hash_uses_the_index() {
        let store = MemoryEnvelopeStore::new();
        let mut envelope = envelope_with(&[("k", "v")], b"indexed");
        store.store(&mut envelope).await.unwrap();

        let hits = store
            .find_by_content_hash(&envelope.content_hash)
            .await
            .unwrap();
        assert_eq!(hits, vec![envelope]);

        let misses = store
            .find_by_content_hash(&ContentHash::of(b"unused"))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn find_by_context_matches_public_references() {
        let store = MemoryEnvelopeStore::new();
        let context = ContentHash::of(b"thread-1");
        let mut with_ref = Envelope::new(
            MessageType::CoreMessage,
            EncryptionMode::None,
            b"in context".to_vec(),
            BTreeMap::new(),
            vec![context],
        );
        let mut without_ref = envelope_with(&[], b"unrelated");
        store.store(&mut with_ref).await.unwrap();
        store.store(&mut without_ref).await.unwrap();

        let hits = store.find_by_context(&context).await.unwrap();
        assert_eq!(hits, vec![with_ref]);
    }

    #[tokio::test]
    async fn list_by_sender_is_newest_first_and_limited() {
        let store = MemoryEnvelopeStore::new();
        for i in 0..5 {
            let mut envelope = envelope_with(
                &[
                    (SENDER_KEY, "alice"),
                    (TIMESTAMP_KEY, &format!("{}", 1000 + i)),
                ],
                format!("message {i}").as_bytes(),
            );
            store.store(&mut envelope).await.unwrap();
        }

        let listed = store.list_by_sender("alice", 3).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].metadata.get(TIMESTAMP_KEY).unwrap(), "1004");
        assert_eq!(listed[2].metadata.get(TIMESTAMP_KEY).unwrap(), "1002");

        assert!(store.list_by_sender("bob", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_envelope_and_indexes() {
        let store = MemoryEnvelopeStore::new();
        let mut envelope = envelope_with(&[(SENDER_KEY, "alice")], b"ephemeral");
        let id = store.store(&mut envelope).await.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(!store.exists(&id).await.unwrap());
        assert!(store
            .find_by_content_hash(&envelope.content_hash)
            .await
            .unwrap()
            .is_empty());
        assert!(store.list_by_sender("alice", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_records_stored_at() {
        let store = MemoryEnvelopeStore::new();
        let mut envelope = envelope_with(&[], b"timed");
        let id = store.store(&mut envelope).await.unwrap();

        let metadata = store.envelope_metadata(&id).await.unwrap();
        assert!(metadata.contains_key(STORED_AT_KEY));
    }

    #[tokio::test]
    async fn backend_info_reports_count() {
        let store = MemoryEnvelopeStore::new();
        let mut envelope = envelope_with(&[], b"counted");
        store.store(&mut envelope).await.unwrap();

        let info = store.backend_info().await;
        assert_eq!(info.backend_type, "memory");
        assert_eq!(info.envelope_count, Some(1));
    }
}
