use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_types::{ContentHash, Envelope, EnvelopeId};

use crate::error::{EnvelopeStoreError, StoreResult};
use crate::traits::{BackendInfo, EnvelopeStore};

/// Routes envelope operations across several named backends.
///
/// Writes go to a designated default backend. Reads fan out across members in
/// insertion order and stop at the first hit; only when every member has
/// been searched does the composite raise `NotFound`, naming each store it
/// tried. Index queries union results across members, skipping backends
/// that cannot answer them.
pub struct CompositeEnvelopeStore {
    stores: Vec<(String, Arc<dyn EnvelopeStore>)>,
    default_name: String,
}

impl CompositeEnvelopeStore {
    /// Build a composite over `stores`, writing to `default_name`.
    ///
    /// Fails if the store list is empty, a name repeats, or the default
    /// names no member.
    pub fn new(
        stores: Vec<(String, Arc<dyn EnvelopeStore>)>,
        default_name: impl Into<String>,
    ) -> StoreResult<Self> {
        let default_name = default_name.into();
        if stores.is_empty() {
            return Err(EnvelopeStoreError::Validation(
                "composite store requires at least one backend".into(),
            ));
        }
        let mut seen = HashSet::new();
        for (name, _) in &stores {
            if !seen.insert(name.as_str()) {
                return Err(EnvelopeStoreError::Validation(format!(
                    "duplicate store name: {name}"
                )));
            }
        }
        if !stores.iter().any(|(name, _)| *name == default_name) {
            return Err(EnvelopeStoreError::Validation(format!(
                "default store {default_name} is not a member"
            )));
        }
        Ok(Self {
            stores,
            default_name,
        })
    }

    /// Name of the backend receiving writes.
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Member names in lookup order.
    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn default_store(&self) -> &Arc<dyn EnvelopeStore> {
        // Constructor guarantees the default is a member.
        &self
            .stores
            .iter()
            .find(|(name, _)| *name == self.default_name)
            .expect("default store validated at construction")
            .1
    }

    fn searched(&self) -> String {
        self.store_names().join(", ")
    }
}

#[async_trait]
impl EnvelopeStore for CompositeEnvelopeStore {
    async fn store(&self, envelope: &mut Envelope) -> StoreResult<EnvelopeId> {
        debug!(store = %self.default_name, "routing write to default store");
        self.default_store().store(envelope).await
    }

    async fn retrieve(&self, id: &EnvelopeId) -> StoreResult<Envelope> {
        for (name, store) in &self.stores {
            match store.retrieve(id).await {
                Ok(envelope) => {
                    debug!(id = %id.short_hex(), store = %name, "envelope found");
                    return Ok(envelope);
                }
                // A miss or a capability gap means "keep looking"; anything
                // else is a broken backend the caller must see.
                Err(EnvelopeStoreError::NotFound { .. })
                | Err(EnvelopeStoreError::UnsupportedOperation { .. }) => continue,
                Err(err) => {
                    warn!(id = %id.short_hex(), store = %name, %err, "store lookup failed");
                    return Err(err);
                }
            }
        }
        Err(EnvelopeStoreError::NotFound {
            id: id.to_string(),
            searched: self.searched(),
        })
    }

    async fn find_by_content_hash(&self, hash: &ContentHash) -> StoreResult<Vec<Envelope>> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (name, store) in &self.stores {
            match store.find_by_content_hash(hash).await {
                Ok(envelopes) => {
                    for envelope in envelopes {
                        if seen.insert(envelope.id()?) {
                            results.push(envelope);
                        }
                    }
                }
                Err(EnvelopeStoreError::UnsupportedQuery { .. }) => {
                    debug!(store = %name, "skipping store without content-hash index");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    async fn find_by_context(&self, context: &ContentHash) -> StoreResult<Vec<Envelope>> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (name, store) in &self.stores {
            match store.find_by_context(context).await {
                Ok(envelopes) => {
                    for envelope in envelopes {
                        if seen.insert(envelope.id()?) {
                            results.push(envelope);
                        }
                    }
                }
                Err(EnvelopeStoreError::UnsupportedQuery { .. }) => {
                    debug!(store = %name, "skipping store without context index");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    async fn list_by_sender(&self, sender: &str, limit: usize) -> StoreResult<Vec<Envelope>> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (name, store) in &self.stores {
            if results.len() >= limit {
                break;
            }
            match store.list_by_sender(sender, limit - results.len()).await {
                Ok(envelopes) => {
                    for envelope in envelopes {
                        if seen.insert(envelope.id()?) {
                            results.push(envelope);
                        }
                    }
                }
                Err(EnvelopeStoreError::UnsupportedQuery { .. }) => {
                    debug!(store = %name, "skipping store without sender index");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    async fn delete(&self, id: &EnvelopeId) -> StoreResult<bool> {
        let mut deleted = false;
        for (name, store) in &self.stores {
            match store.delete(id).await {
                Ok(hit) => deleted |= hit,
                Err(EnvelopeStoreError::UnsupportedOperation { .. }) => {
                    debug!(store = %name, "skipping immutable store on delete");
                }
                Err(err) => {
                    warn!(id = %id.short_hex(), store = %name, %err, "delete failed");
                }
            }
        }
        Ok(deleted)
    }

    async fn exists(&self, id: &EnvelopeId) -> StoreResult<bool> {
        for (_, store) in &self.stores {
            if store.exists(id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn envelope_metadata(&self, id: &EnvelopeId) -> StoreResult<BTreeMap<String, String>> {
        for (_, store) in &self.stores {
            match store.envelope_metadata(id).await {
                Ok(metadata) => return Ok(metadata),
                Err(EnvelopeStoreError::NotFound { .. })
                | Err(EnvelopeStoreError::UnsupportedOperation { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(EnvelopeStoreError::NotFound {
            id: id.to_string(),
            searched: self.searched(),
        })
    }

    async fn backend_info(&self) -> BackendInfo {
        let mut members = Vec::with_capacity(self.stores.len());
        for (name, store) in &self.stores {
            let mut info = store.backend_info().await;
            info.name = name.clone();
            members.push(info);
        }
        BackendInfo::new(self.name(), "composite")
            .with_detail("default", &self.default_name)
            .with_members(members)
    }

    fn name(&self) -> &str {
        "composite"
    }
}

impl std::fmt::Debug for CompositeEnvelopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEnvelopeStore")
            .field("stores", &self.store_names())
            .field("default", &self.default_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use courier_clients::{ClientError, MemoryKv, MemoryLedger};
    use courier_types::{EncryptionMode, MessageType};

    use crate::cache::CacheEnvelopeStore;
    use crate::ledger::LedgerEnvelopeStore;
    use crate::memory::MemoryEnvelopeStore;

    use super::*;

    fn envelope(payload: &[u8]) -> Envelope {
        Envelope::new(
            MessageType::CoreMessage,
            EncryptionMode::None,
            payload.to_vec(),
            BTreeMap::new(),
            Vec::new(),
        )
    }

    /// Member whose backing connection is down: every operation fails with
    /// a client error.
    struct BrokenStore;

    impl BrokenStore {
        fn down() -> EnvelopeStoreError {
            EnvelopeStoreError::Client(ClientError::Connection {
                backend: "kv",
                reason: "connection refused".into(),
            })
        }
    }

    #[async_trait]
    impl EnvelopeStore for BrokenStore {
        async fn store(&self, _envelope: &mut Envelope) -> StoreResult<EnvelopeId> {
            Err(Self::down())
        }

        async fn retrieve(&self, _id: &EnvelopeId) -> StoreResult<Envelope> {
            Err(Self::down())
        }

        async fn find_by_content_hash(&self, _hash: &ContentHash) -> StoreResult<Vec<Envelope>> {
            Err(Self::down())
        }

        async fn find_by_context(&self, _context: &ContentHash) -> StoreResult<Vec<Envelope>> {
            Err(Self::down())
        }

        async fn list_by_sender(&self, _sender: &str, _limit: usize) -> StoreResult<Vec<Envelope>> {
            Err(Self::down())
        }

        async fn delete(&self, _id: &EnvelopeId) -> StoreResult<bool> {
            Err(Self::down())
        }

        async fn exists(&self, _id: &EnvelopeId) -> StoreResult<bool> {
            Err(Self::down())
        }

        async fn envelope_metadata(
            &self,
            _id: &EnvelopeId,
        ) -> StoreResult<BTreeMap<String, String>> {
            Err(Self::down())
        }

        async fn backend_info(&self) -> BackendInfo {
            BackendInfo::new(self.name(), "broken")
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn cache_and_ledger() -> CompositeEnvelopeStore {
        let cache = Arc::new(CacheEnvelopeStore::new(Arc::new(MemoryKv::new())));
        let ledger = Arc::new(LedgerEnvelopeStore::new(Arc::new(MemoryLedger::new())));
        CompositeEnvelopeStore::new(
            vec![("cache".into(), cache as _), ("ledger".into(), ledger as _)],
            "cache",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn constructor_rejects_bad_configurations() {
        assert!(matches!(
            CompositeEnvelopeStore::new(Vec::new(), "cache").unwrap_err(),
            EnvelopeStoreError::Validation(_)
        ));

        let a = Arc::new(MemoryEnvelopeStore::new());
        assert!(matches!(
            CompositeEnvelopeStore::new(vec![("a".into(), a.clone() as _)], "missing").unwrap_err(),
            EnvelopeStoreError::Validation(_)
        ));

        let b = Arc::new(MemoryEnvelopeStore::new());
        assert!(matches!(
            CompositeEnvelopeStore::new(
                vec![("a".into(), a as _), ("a".into(), b as _)],
                "a"
            )
            .unwrap_err(),
            EnvelopeStoreError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn writes_land_in_the_default_store() {
        let primary = Arc::new(MemoryEnvelopeStore::new());
        let secondary = Arc::new(MemoryEnvelopeStore::new());
        let composite = CompositeEnvelopeStore::new(
            vec![
                ("primary".into(), primary.clone() as _),
                ("secondary".into(), secondary.clone() as _),
            ],
            "primary",
        )
        .unwrap();

        let mut env = envelope(b"routed");
        let id = composite.store(&mut env).await.unwrap();

        assert!(primary.exists(&id).await.unwrap());
        assert!(!secondary.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn retrieve_searches_members_in_order() {
        let first = Arc::new(MemoryEnvelopeStore::new());
        let second = Arc::new(MemoryEnvelopeStore::new());
        let composite = CompositeEnvelopeStore::new(
            vec![
                ("first".into(), first as _),
                ("second".into(), second.clone() as _),
            ],
            "first",
        )
        .unwrap();

        // Stored only in the non-default member; the fan-out read still finds it.
        let mut env = envelope(b"in second");
        let id = second.store(&mut env).await.unwrap();
        assert_eq!(composite.retrieve(&id).await.unwrap(), env);
        assert!(composite.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn exhausted_search_names_every_store_searched() {
        let composite = cache_and_ledger();
        let id = envelope(b"nowhere").id().unwrap();

        let err = composite.retrieve(&id).await.unwrap_err();
        let EnvelopeStoreError::NotFound { searched, .. } = &err else {
            panic!("expected NotFound, got {err}");
        };
        assert!(searched.contains("cache"));
        assert!(searched.contains("ledger"));
    }

    #[tokio::test]
    async fn broken_member_failure_is_not_masked_as_not_found() {
        let memory = Arc::new(MemoryEnvelopeStore::new());
        let composite = CompositeEnvelopeStore::new(
            vec![
                ("broken".into(), Arc::new(BrokenStore) as _),
                ("memory".into(), memory as _),
            ],
            "memory",
        )
        .unwrap();
        let id = envelope(b"unreachable").id().unwrap();

        // The envelope is genuinely absent from the healthy member, but the
        // broken member's failure must reach the caller, not become NotFound.
        assert!(matches!(
            composite.retrieve(&id).await.unwrap_err(),
            EnvelopeStoreError::Client(_)
        ));
        assert!(matches!(
            composite.exists(&id).await.unwrap_err(),
            EnvelopeStoreError::Client(_)
        ));
    }

    #[tokio::test]
    async fn find_skips_stores_without_an_index() {
        let composite = cache_and_ledger();
        let mut env = envelope(b"query me");
        composite.store(&mut env).await.unwrap();

        // The ledger member raises UnsupportedQuery and is skipped.
        let hits = composite
            .find_by_content_hash(&env.content_hash)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_best_effort_across_members() {
        let composite = cache_and_ledger();
        let mut env = envelope(b"deletable");
        let id = composite.store(&mut env).await.unwrap();

        // Cache deletes; the immutable ledger member is skipped.
        assert!(composite.delete(&id).await.unwrap());
        assert!(!composite.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn backend_info_aggregates_members() {
        let composite = cache_and_ledger();
        let info = composite.backend_info().await;

        assert_eq!(info.backend_type, "composite");
        assert_eq!(info.details.get("default").unwrap(), "cache");
        assert_eq!(info.members.len(), 2);
        assert_eq!(info.members[0].name, "cache");
        assert_eq!(info.members[1].name, "ledger");
    }
}
