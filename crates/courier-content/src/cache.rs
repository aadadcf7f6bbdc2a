use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_clients::KvClient;
use courier_types::{ContentDescriptor, ContentHash};

use crate::error::{ContentResult, ContentStorageError};
use crate::traits::{ContentStorage, PROVIDER_KEY};

/// Default key prefix for cached content.
pub const DEFAULT_KEY_PREFIX: &str = "courier:content";

/// The blob stored per content hash: the bytes plus enough metadata to
/// reconstruct a descriptor.
#[derive(Serialize, Deserialize)]
struct CachedBlob {
    content_hex: String,
    content_type: String,
    content_length: u64,
    content_hash: String,
}

/// Stores content in a networked key-value cache, keyed by content hash.
///
/// Content and metadata travel as one serialized blob. Retrieval re-verifies
/// the hash on read and raises on mismatch, defending against cache
/// corruption.
pub struct CacheStorage {
    kv: Arc<dyn KvClient>,
    key_prefix: String,
}

impl CacheStorage {
    pub fn new(kv: Arc<dyn KvClient>) -> Self {
        Self::with_prefix(kv, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(kv: Arc<dyn KvClient>, key_prefix: impl Into<String>) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.into(),
        }
    }

    fn content_key(&self, hash: &ContentHash) -> String {
        format!("{}:{}", self.key_prefix, hash.to_hex())
    }

    fn hash_of_uri(uri: &str) -> ContentResult<ContentHash> {
        let hex = uri.strip_prefix("cache://").ok_or_else(|| {
            ContentStorageError::Validation(format!("invalid cache URI: {uri}"))
        })?;
        ContentHash::from_hex(hex).map_err(|e| {
            ContentStorageError::Validation(format!("invalid cache URI {uri}: {e}"))
        })
    }
}

#[async_trait]
impl ContentStorage for CacheStorage {
    async fn store(&self, content: &[u8], content_type: &str) -> ContentResult<ContentDescriptor> {
        let content_hash = ContentHash::of(content);
        let key = self.content_key(&content_hash);

        let blob = CachedBlob {
            content_hex: hex::encode(content),
            content_type: content_type.to_string(),
            content_length: content.len() as u64,
            content_hash: content_hash.to_hex(),
        };
        let bytes = serde_json::to_vec(&blob)
            .map_err(|e| ContentStorageError::Codec(format!("cache blob: {e}")))?;
        self.kv.put(&key, bytes).await?;
        debug!(key = %key, len = content.len(), "content cached");

        Ok(ContentDescriptor::new(
            format!("cache://{}", content_hash.to_hex()),
            content_type,
            content.len() as u64,
            content_hash,
        )
        .with_metadata(PROVIDER_KEY, self.provider())
        .with_metadata("cache_key", key))
    }

    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>> {
        let content_hash = Self::hash_of_uri(&descriptor.uri)?;
        let key = self.content_key(&content_hash);

        let bytes = self
            .kv
            .get(&key)
            .await?
            .ok_or_else(|| ContentStorageError::NotFound {
                uri: descriptor.uri.clone(),
            })?;
        let blob: CachedBlob = serde_json::from_slice(&bytes)
            .map_err(|e| ContentStorageError::Codec(format!("cache blob: {e}")))?;
        let content = hex::decode(&blob.content_hex)
            .map_err(|e| ContentStorageError::Codec(format!("cache blob content: {e}")))?;

        let computed = ContentHash::of(&content);
        if computed != content_hash {
            return Err(ContentStorageError::HashMismatch {
                uri: descriptor.uri.clone(),
                expected: content_hash.to_hex(),
                computed: computed.to_hex(),
            });
        }
        Ok(content)
    }

    fn can_handle(&self, uri: &str) -> bool {
        uri.starts_with("cache://")
    }

    fn provider(&self) -> &'static str {
        "cache"
    }
}
