use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use courier_content::{ContentStorage, MultipartStorage};
use courier_envelope::{
    Created, EnvelopeFactory, LargeContentStrategy, CONTENT_HASH_KEY, CONTENT_TYPE_KEY,
    CONTENT_URI_KEY,
};
use courier_store::{CompositeEnvelopeStore, EnvelopeStore};
use courier_types::{
    ContentDescriptor, ContentHash, CoreMessage, EncryptionMode, Envelope, EnvelopeId, MessageType,
};

use crate::config::{CourierConfig, LargeContent};
use crate::error::{SdkError, SdkResult};

/// One-stop facade over envelope creation and persistence.
///
/// `send` turns content into however many envelopes it needs and persists
/// them all; `open` is the inverse, reassembling chunked messages and
/// dereferencing offloaded content back to the original bytes.
pub struct Courier {
    factory: EnvelopeFactory,
    store: CompositeEnvelopeStore,
    content: Option<Arc<dyn ContentStorage>>,
}

impl Courier {
    pub fn new(factory: EnvelopeFactory, store: CompositeEnvelopeStore) -> Self {
        Self {
            factory,
            store,
            content: None,
        }
    }

    /// Build the factory from configuration and wire it to `store`.
    ///
    /// Fails if the store's write target disagrees with the configured
    /// default store name.
    pub fn from_config(config: &CourierConfig, store: CompositeEnvelopeStore) -> SdkResult<Self> {
        if store.default_name() != config.default_store {
            return Err(SdkError::Config(format!(
                "store writes to {} but configuration names {} as default",
                store.default_name(),
                config.default_store
            )));
        }
        let strategy = match config.large_content {
            LargeContent::Chunk => {
                LargeContentStrategy::Chunk(MultipartStorage::new(config.max_part_size))
            }
            LargeContent::Reject => LargeContentStrategy::Reject,
        };
        Ok(Self::new(
            EnvelopeFactory::new(config.max_envelope_size, strategy),
            store,
        ))
    }

    /// Attach a content storage backend for dereferencing offloaded
    /// envelopes.
    pub fn with_content_storage(mut self, content: Arc<dyn ContentStorage>) -> Self {
        self.content = Some(content);
        self
    }

    /// Create and persist every envelope `content` needs. Returns the
    /// stored ids in transmission order.
    pub async fn send(
        &self,
        content: &[u8],
        context_references: Vec<ContentHash>,
        encryption: EncryptionMode,
        metadata: BTreeMap<String, String>,
        content_type: &str,
    ) -> SdkResult<Vec<EnvelopeId>> {
        let created = self
            .factory
            .create(content, context_references, encryption, metadata, content_type)
            .await?;

        let mut envelopes = match created {
            Created::Single(envelope) => vec![envelope],
            Created::Chunked(envelopes) => envelopes,
            Created::Referenced { envelope, .. } => vec![envelope],
        };

        let mut ids = Vec::with_capacity(envelopes.len());
        for envelope in &mut envelopes {
            ids.push(self.store.store(envelope).await?);
        }
        info!(
            envelopes = ids.len(),
            bytes = content.len(),
            "content sent"
        );
        Ok(ids)
    }

    /// Fetch the envelopes behind `ids` and return the original content.
    ///
    /// A single CORE_MESSAGE envelope yields its payload (dereferenced
    /// through content storage when it is an offloaded pointer); a set of
    /// multipart envelopes is validated and reassembled.
    pub async fn open(&self, ids: &[EnvelopeId]) -> SdkResult<Vec<u8>> {
        if ids.is_empty() {
            return Err(SdkError::Validation("no envelope ids to open".into()));
        }

        let mut envelopes = Vec::with_capacity(ids.len());
        for id in ids {
            envelopes.push(self.store.retrieve(id).await?);
        }

        if envelopes
            .iter()
            .all(|e| e.message_type == MessageType::MultiPartMessagePart)
        {
            let content = self.factory.reconstruct(&envelopes)?;
            debug!(parts = envelopes.len(), bytes = content.len(), "content reassembled");
            return Ok(content);
        }

        let [envelope] = envelopes.as_slice() else {
            return Err(SdkError::Validation(format!(
                "{} envelopes do not form one message",
                envelopes.len()
            )));
        };

        let core = CoreMessage::from_bytes(&envelope.message)?;
        if envelope.metadata.contains_key(CONTENT_URI_KEY) {
            return self.dereference(envelope).await;
        }
        Ok(core.content)
    }

    /// Access the underlying store, for queries beyond send/open.
    pub fn store(&self) -> &CompositeEnvelopeStore {
        &self.store
    }

    async fn dereference(&self, envelope: &Envelope) -> SdkResult<Vec<u8>> {
        let Some(content) = &self.content else {
            return Err(SdkError::Validation(
                "envelope points at offloaded content but no content storage is wired".into(),
            ));
        };
        // Pointer metadata carries everything needed to rebuild the
        // descriptor.
        let uri = envelope
            .metadata
            .get(CONTENT_URI_KEY)
            .cloned()
            .unwrap_or_default();
        let content_hash = envelope
            .metadata
            .get(CONTENT_HASH_KEY)
            .map(|h| ContentHash::from_hex(h))
            .transpose()?
            .unwrap_or_else(ContentHash::null);
        let content_type = envelope
            .metadata
            .get(CONTENT_TYPE_KEY)
            .cloned()
            .unwrap_or_else(|| "application/octet-stream".into());

        let descriptor = ContentDescriptor::new(uri, content_type, 0, content_hash);
        let bytes = content.retrieve(&descriptor).await?;
        debug!(uri = %descriptor.uri, bytes = bytes.len(), "offloaded content dereferenced");
        Ok(bytes)
    }
}

impl std::fmt::Debug for Courier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Courier")
            .field("max_envelope_size", &self.factory.max_envelope_size())
            .field("store", &self.store)
            .field("content_storage", &self.content.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use courier_clients::MemoryKv;
    use courier_content::CacheStorage;
    use courier_store::MemoryEnvelopeStore;

    use super::*;

    fn memory_composite() -> CompositeEnvelopeStore {
        let memory = Arc::new(MemoryEnvelopeStore::new());
        CompositeEnvelopeStore::new(vec![("memory".into(), memory as _)], "memory").unwrap()
    }

    fn chunking_courier(max: u64) -> Courier {
        Courier::new(
            EnvelopeFactory::new(max, LargeContentStrategy::Chunk(MultipartStorage::new(800))),
            memory_composite(),
        )
    }

    #[tokio::test]
    async fn send_open_round_trip_for_small_content() {
        let courier = chunking_courier(1000);
        let ids = courier
            .send(
                b"a short note",
                Vec::new(),
                EncryptionMode::Protected,
                BTreeMap::new(),
                "text/plain",
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);

        assert_eq!(courier.open(&ids).await.unwrap(), b"a short note");
    }

    #[tokio::test]
    async fn send_open_round_trip_for_chunked_content() {
        let courier = chunking_courier(2000);
        let content: Vec<u8> = (0..5000u32).map(|i| (i % 199) as u8).collect();
        let ids = courier
            .send(
                &content,
                Vec::new(),
                EncryptionMode::Protected,
                BTreeMap::new(),
                "application/octet-stream",
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 7);

        assert_eq!(courier.open(&ids).await.unwrap(), content);
    }

    #[tokio::test]
    async fn send_open_round_trip_for_offloaded_content() {
        let blob_store: Arc<dyn ContentStorage> =
            Arc::new(CacheStorage::new(Arc::new(MemoryKv::new())));
        let courier = Courier::new(
            EnvelopeFactory::new(600, LargeContentStrategy::Offload(blob_store.clone())),
            memory_composite(),
        )
        .with_content_storage(blob_store);

        let content = vec![42u8; 4000];
        let ids = courier
            .send(
                &content,
                Vec::new(),
                EncryptionMode::Protected,
                BTreeMap::new(),
                "application/octet-stream",
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);

        assert_eq!(courier.open(&ids).await.unwrap(), content);
    }

    #[tokio::test]
    async fn offloaded_content_without_wiring_is_an_error() {
        let blob_store: Arc<dyn ContentStorage> =
            Arc::new(CacheStorage::new(Arc::new(MemoryKv::new())));
        let courier = Courier::new(
            EnvelopeFactory::new(600, LargeContentStrategy::Offload(blob_store)),
            memory_composite(),
        );

        let ids = courier
            .send(
                &vec![1u8; 4000],
                Vec::new(),
                EncryptionMode::None,
                BTreeMap::new(),
                "application/octet-stream",
            )
            .await
            .unwrap();

        let err = courier.open(&ids).await.unwrap_err();
        assert!(matches!(err, SdkError::Validation(_)));
    }

    #[tokio::test]
    async fn open_with_no_ids_is_an_error() {
        let courier = chunking_courier(1000);
        assert!(matches!(
            courier.open(&[]).await.unwrap_err(),
            SdkError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn from_config_checks_the_default_store() {
        let config = CourierConfig::default();
        // Config names "cache" but the composite writes to "memory".
        let err = Courier::from_config(&config, memory_composite()).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));

        let config = CourierConfig {
            default_store: "memory".into(),
            ..CourierConfig::default()
        };
        let courier = Courier::from_config(&config, memory_composite()).unwrap();
        assert_eq!(courier.factory.max_envelope_size(), 1000);
    }
}
