use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use courier_types::{
    ContentDescriptor, ContentHash, EncryptionMode, Envelope, MessageType, MultiPartMessagePart,
};

use crate::error::{ContentResult, ContentStorageError};
use crate::traits::{ContentStorage, PROVIDER_KEY};

/// Default maximum content bytes per part.
pub const DEFAULT_MAX_PART_SIZE: usize = 800;

/// Descriptor metadata keys written by [`MultipartStorage::store`].
pub const MESSAGE_ID_KEY: &str = "message_id";
pub const TOTAL_PARTS_KEY: &str = "total_parts";
pub const PART_SIZE_KEY: &str = "part_size";

/// Envelope metadata key marking a part's position, `part_{i}_of_{n}`.
pub const CHUNK_INFO_KEY: &str = "chunk_info";

/// Storage-agnostic multipart chunking.
///
/// This backend knows nothing about any persistence medium. `store` only
/// plans the split — it returns a descriptor carrying the message id and
/// part count without writing a single byte. [`MultipartStorage::part_envelopes`]
/// then materializes the ordered part envelopes, and the caller persists
/// them through whatever envelope store it chooses. Collecting the parts
/// back together is the store layer's job, so `retrieve` is unsupported
/// here.
#[derive(Clone, Copy, Debug)]
pub struct MultipartStorage {
    max_part_size: usize,
}

impl Default for MultipartStorage {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PART_SIZE)
    }
}

impl MultipartStorage {
    pub fn new(max_part_size: usize) -> Self {
        Self { max_part_size }
    }

    /// Maximum content bytes per part.
    pub fn max_part_size(&self) -> usize {
        self.max_part_size
    }

    /// Materialize the ordered part envelopes for content previously
    /// described by [`MultipartStorage::store`].
    ///
    /// Every produced envelope has message type MULTIPART_MESSAGE_PART, a
    /// shared message id, 1-based part numbers, and the complete-message
    /// hash taken from the descriptor.
    pub fn part_envelopes(
        &self,
        content: &[u8],
        descriptor: &ContentDescriptor,
        encryption: EncryptionMode,
        base_metadata: &BTreeMap<String, String>,
    ) -> ContentResult<Vec<Envelope>> {
        if !self.can_handle(&descriptor.uri) {
            return Err(ContentStorageError::Validation(format!(
                "invalid multipart URI: {}",
                descriptor.uri
            )));
        }

        let message_id = descriptor
            .metadata
            .get(MESSAGE_ID_KEY)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ContentStorageError::Validation(format!(
                    "descriptor {} is missing multipart message id",
                    descriptor.uri
                ))
            })?;
        let total_parts: u32 = descriptor
            .metadata
            .get(TOTAL_PARTS_KEY)
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ContentStorageError::Validation(format!(
                    "descriptor {} is missing multipart part count",
                    descriptor.uri
                ))
            })?;

        let mut envelopes = Vec::with_capacity(total_parts as usize);
        for (index, chunk) in content.chunks(self.max_part_size).enumerate() {
            let part_number = index as u32 + 1;
            let part = MultiPartMessagePart {
                message_id: message_id.clone(),
                part_number,
                total_parts,
                content: chunk.to_vec(),
                complete_message_hash: descriptor.content_hash,
            };

            let mut metadata = base_metadata.clone();
            metadata.insert(
                CHUNK_INFO_KEY.into(),
                format!("part_{part_number}_of_{total_parts}"),
            );
            metadata.insert(MESSAGE_ID_KEY.into(), message_id.clone());

            envelopes.push(Envelope::new(
                MessageType::MultiPartMessagePart,
                encryption,
                part.to_bytes()?,
                metadata,
                Vec::new(),
            ));
        }

        debug!(
            message_id = %message_id,
            parts = envelopes.len(),
            "multipart envelopes materialized"
        );
        Ok(envelopes)
    }
}

#[async_trait]
impl ContentStorage for MultipartStorage {
    async fn store(&self, content: &[u8], content_type: &str) -> ContentResult<ContentDescriptor> {
        if content.is_empty() {
            return Err(ContentStorageError::Validation(
                "cannot chunk empty content".into(),
            ));
        }

        let message_id = Uuid::new_v4().to_string();
        let content_hash = ContentHash::of(content);
        let total_parts = content.len().div_ceil(self.max_part_size);

        Ok(ContentDescriptor::new(
            format!("multipart://{message_id}"),
            content_type,
            content.len() as u64,
            content_hash,
        )
        .with_metadata(PROVIDER_KEY, self.provider())
        .with_metadata(MESSAGE_ID_KEY, message_id)
        .with_metadata(TOTAL_PARTS_KEY, total_parts.to_string())
        .with_metadata(PART_SIZE_KEY, self.max_part_size.to_string()))
    }

    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>> {
        if !self.can_handle(&descriptor.uri) {
            return Err(ContentStorageError::Validation(format!(
                "invalid multipart URI: {}",
                descriptor.uri
            )));
        }
        // Reassembly needs all part envelopes, which live in an envelope
        // store this backend has no access to.
        Err(ContentStorageError::Unsupported {
            backend: "multipart",
            operation: "retrieve",
        })
    }

    fn can_handle(&self, uri: &str) -> bool {
        uri.starts_with("multipart://")
    }

    fn provider(&self) -> &'static str {
        "multipart"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_plans_the_split_without_writing() {
        let storage = MultipartStorage::new(800);
        let content = vec![0xAB; 5000];
        let desc = storage
            .store(&content, "application/octet-stream")
            .await
            .unwrap();

        assert!(desc.uri.starts_with("multipart://"));
        assert_eq!(desc.metadata.get(TOTAL_PARTS_KEY).unwrap(), "7");
        assert_eq!(desc.metadata.get(PART_SIZE_KEY).unwrap(), "800");
        assert_eq!(desc.content_hash, ContentHash::of(&content));
    }

    #[tokio::test]
    async fn part_envelopes_are_ordered_and_consistent() {
        let storage = MultipartStorage::new(800);
        let content = vec![0xCD; 5000];
        let desc = storage
            .store(&content, "application/octet-stream")
            .await
            .unwrap();

        let envelopes = storage
            .part_envelopes(&content, &desc, EncryptionMode::Protected, &BTreeMap::new())
            .unwrap();
        assert_eq!(envelopes.len(), 7);

        for (i, envelope) in envelopes.iter().enumerate() {
            assert_eq!(envelope.message_type, MessageType::MultiPartMessagePart);
            let part = MultiPartMessagePart::from_bytes(&envelope.message).unwrap();
            assert_eq!(part.part_number, i as u32 + 1);
            assert_eq!(part.total_parts, 7);
            assert_eq!(part.complete_message_hash, desc.content_hash);
            assert_eq!(
                envelope.metadata.get(CHUNK_INFO_KEY).unwrap(),
                &format!("part_{}_of_7", i + 1)
            );
        }

        // Concatenation ordered by part number reproduces the content.
        let mut reassembled = Vec::new();
        for envelope in &envelopes {
            let part = MultiPartMessagePart::from_bytes(&envelope.message).unwrap();
            reassembled.extend_from_slice(&part.content);
        }
        assert_eq!(reassembled, content);
    }

    #[tokio::test]
    async fn final_part_may_be_shorter() {
        let storage = MultipartStorage::new(100);
        let content = vec![1u8; 250];
        let desc = storage.store(&content, "x").await.unwrap();
        let envelopes = storage
            .part_envelopes(&content, &desc, EncryptionMode::None, &BTreeMap::new())
            .unwrap();
        assert_eq!(envelopes.len(), 3);

        let last = MultiPartMessagePart::from_bytes(&envelopes[2].message).unwrap();
        assert_eq!(last.content.len(), 50);
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let storage = MultipartStorage::default();
        let err = storage.store(b"", "x").await.unwrap_err();
        assert!(matches!(err, ContentStorageError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_descriptor_metadata_is_rejected() {
        let storage = MultipartStorage::default();
        let desc = ContentDescriptor::new("multipart://id", "x", 10, ContentHash::of(b"x"));
        let err = storage
            .part_envelopes(b"content", &desc, EncryptionMode::None, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ContentStorageError::Validation(_)));
    }

    #[tokio::test]
    async fn retrieve_is_unsupported() {
        let storage = MultipartStorage::default();
        let desc = ContentDescriptor::new("multipart://id", "x", 0, ContentHash::null());
        let err = storage.retrieve(&desc).await.unwrap_err();
        assert!(matches!(
            err,
            ContentStorageError::Unsupported {
                backend: "multipart",
                ..
            }
        ));
    }
}
