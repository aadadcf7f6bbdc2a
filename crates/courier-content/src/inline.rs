use async_trait::async_trait;
use tracing::debug;

use courier_types::{ContentDescriptor, ContentHash};

use crate::error::{ContentResult, ContentStorageError};
use crate::traits::{ContentStorage, PROVIDER_KEY};

/// Descriptor metadata key holding the hex-encoded content.
pub const CONTENT_DATA_KEY: &str = "content_data";

const INLINE_URI: &str = "inline://data";

/// Embeds content directly inside the descriptor metadata.
///
/// Zero external dependency: the descriptor is self-contained. Retrieval
/// re-verifies the content hash and fails on mismatch.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineStorage;

impl InlineStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentStorage for InlineStorage {
    async fn store(&self, content: &[u8], content_type: &str) -> ContentResult<ContentDescriptor> {
        let content_hash = ContentHash::of(content);
        debug!(hash = %content_hash.short_hex(), len = content.len(), "storing inline");
        Ok(
            ContentDescriptor::new(INLINE_URI, content_type, content.len() as u64, content_hash)
                .with_metadata(PROVIDER_KEY, self.provider())
                .with_metadata(CONTENT_DATA_KEY, hex::encode(content)),
        )
    }

    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>> {
        if !self.can_handle(&descriptor.uri) {
            return Err(ContentStorageError::Validation(format!(
                "invalid inline URI: {}",
                descriptor.uri
            )));
        }

        let encoded = descriptor
            .metadata
            .get(CONTENT_DATA_KEY)
            .ok_or_else(|| ContentStorageError::NotFound {
                uri: descriptor.uri.clone(),
            })?;
        let content = hex::decode(encoded)
            .map_err(|e| ContentStorageError::Codec(format!("inline content data: {e}")))?;

        let computed = ContentHash::of(&content);
        if computed != descriptor.content_hash {
            return Err(ContentStorageError::HashMismatch {
                uri: descriptor.uri.clone(),
                expected: descriptor.content_hash.to_hex(),
                computed: computed.to_hex(),
            });
        }
        Ok(content)
    }

    fn can_handle(&self, uri: &str) -> bool {
        uri.starts_with("inline://")
    }

    fn provider(&self) -> &'static str {
        "inline"
    }
}
