use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use courier_content::{ContentStorage, MultipartStorage};
use courier_types::{
    ContentDescriptor, ContentHash, CoreMessage, EncryptionMode, Envelope, MessageType,
    MultiPartMessagePart,
};

use crate::error::{FactoryError, FactoryResult};
use crate::reconstruct::reconstruct_content;

/// Estimated framing bytes an envelope adds around its payload. Used to
/// derive a chunk content target from the envelope size limit; every
/// produced chunk is still validated against the real serialized size.
pub const ENVELOPE_OVERHEAD: u64 = 200;

/// Metadata keys written on an offloaded-reference envelope.
pub const CONTENT_URI_KEY: &str = "content_uri";
pub const CONTENT_HASH_KEY: &str = "content_hash";
pub const CONTENT_TYPE_KEY: &str = "content_type";

/// What to do with content too large for a single envelope.
#[derive(Clone)]
pub enum LargeContentStrategy {
    /// Split into ordered MULTIPART_MESSAGE_PART envelopes.
    Chunk(MultipartStorage),
    /// Store the content externally and emit a pointer envelope.
    Offload(Arc<dyn ContentStorage>),
    /// Fail with a validation error.
    Reject,
}

impl fmt::Debug for LargeContentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk(storage) => f.debug_tuple("Chunk").field(storage).finish(),
            Self::Offload(storage) => f.debug_tuple("Offload").field(&storage.provider()).finish(),
            Self::Reject => write!(f, "Reject"),
        }
    }
}

/// Outcome of [`EnvelopeFactory::create`].
#[derive(Clone, Debug)]
pub enum Created {
    /// Content fit in one envelope.
    Single(Envelope),
    /// Content was split into ordered part envelopes.
    Chunked(Vec<Envelope>),
    /// Content lives in external storage; the envelope is a pointer.
    Referenced {
        envelope: Envelope,
        descriptor: ContentDescriptor,
    },
}

impl Created {
    /// All envelopes produced, in transmission order.
    pub fn envelopes(&self) -> Vec<&Envelope> {
        match self {
            Self::Single(envelope) | Self::Referenced { envelope, .. } => vec![envelope],
            Self::Chunked(envelopes) => envelopes.iter().collect(),
        }
    }
}

/// Turns raw content into transport envelopes under a size limit.
///
/// Factory-level default metadata is merged under caller metadata on every
/// envelope, so per-call keys win over defaults.
#[derive(Clone, Debug)]
pub struct EnvelopeFactory {
    max_envelope_size: u64,
    default_metadata: BTreeMap<String, String>,
    strategy: LargeContentStrategy,
}

impl EnvelopeFactory {
    pub fn new(max_envelope_size: u64, strategy: LargeContentStrategy) -> Self {
        Self {
            max_envelope_size,
            default_metadata: BTreeMap::new(),
            strategy,
        }
    }

    /// Attach metadata stamped on every produced envelope.
    pub fn with_default_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.default_metadata = metadata;
        self
    }

    pub fn max_envelope_size(&self) -> u64 {
        self.max_envelope_size
    }

    /// Build envelopes for `content`.
    ///
    /// Content whose CORE_MESSAGE envelope fits the limit yields
    /// [`Created::Single`]; anything larger goes through the configured
    /// [`LargeContentStrategy`].
    pub async fn create(
        &self,
        content: &[u8],
        context_references: Vec<ContentHash>,
        encryption: EncryptionMode,
        metadata: BTreeMap<String, String>,
        content_type: &str,
    ) -> FactoryResult<Created> {
        let metadata = self.merged_metadata(metadata);

        let core = CoreMessage::new(content.to_vec(), context_references.clone());
        let envelope = Envelope::new(
            MessageType::CoreMessage,
            encryption,
            core.to_bytes()?,
            metadata.clone(),
            Vec::new(),
        );
        let size = envelope.serialized_len()?;
        if size <= self.max_envelope_size {
            debug!(size, "content fits in a single envelope");
            return Ok(Created::Single(envelope));
        }

        debug!(
            size,
            max = self.max_envelope_size,
            strategy = ?self.strategy,
            "content exceeds envelope limit"
        );
        match &self.strategy {
            LargeContentStrategy::Chunk(storage) => {
                self.chunk(content, encryption, metadata, content_type, *storage)
                    .await
            }
            LargeContentStrategy::Offload(storage) => {
                self.offload(
                    content,
                    context_references,
                    encryption,
                    metadata,
                    content_type,
                    storage.as_ref(),
                )
                .await
            }
            LargeContentStrategy::Reject => Err(FactoryError::EnvelopeTooLarge {
                size,
                max: self.max_envelope_size,
            }),
        }
    }

    /// Reassemble content from the part envelopes of one multipart message.
    pub fn reconstruct(&self, envelopes: &[Envelope]) -> FactoryResult<Vec<u8>> {
        reconstruct_content(envelopes)
    }

    async fn chunk(
        &self,
        content: &[u8],
        encryption: EncryptionMode,
        metadata: BTreeMap<String, String>,
        content_type: &str,
        storage: MultipartStorage,
    ) -> FactoryResult<Created> {
        let target = self.max_envelope_size.saturating_sub(ENVELOPE_OVERHEAD);
        if target == 0 {
            return Err(FactoryError::LimitTooSmall {
                max: self.max_envelope_size,
                overhead: ENVELOPE_OVERHEAD,
            });
        }

        // Clamp the part size so each chunk's content leaves room for
        // envelope framing under the limit.
        let part_size = storage.max_part_size().min(target as usize);
        let storage = MultipartStorage::new(part_size);

        let descriptor = storage.store(content, content_type).await?;
        let envelopes = storage.part_envelopes(content, &descriptor, encryption, &metadata)?;

        for envelope in &envelopes {
            let size = envelope.serialized_len()?;
            if size > self.max_envelope_size {
                let part = MultiPartMessagePart::from_bytes(&envelope.message)?;
                return Err(FactoryError::ChunkTooLarge {
                    part_number: part.part_number,
                    size,
                    max: self.max_envelope_size,
                });
            }
        }

        debug!(
            parts = envelopes.len(),
            part_size, "content chunked into part envelopes"
        );
        Ok(Created::Chunked(envelopes))
    }

    async fn offload(
        &self,
        content: &[u8],
        context_references: Vec<ContentHash>,
        encryption: EncryptionMode,
        mut metadata: BTreeMap<String, String>,
        content_type: &str,
        storage: &dyn ContentStorage,
    ) -> FactoryResult<Created> {
        let descriptor = storage.store(content, content_type).await?;

        metadata.insert(CONTENT_URI_KEY.into(), descriptor.uri.clone());
        metadata.insert(CONTENT_HASH_KEY.into(), descriptor.content_hash.to_hex());
        metadata.insert(CONTENT_TYPE_KEY.into(), descriptor.content_type.clone());

        let pointer = CoreMessage::new(descriptor.uri.clone().into_bytes(), context_references);
        let envelope = Envelope::new(
            MessageType::CoreMessage,
            encryption,
            pointer.to_bytes()?,
            metadata,
            Vec::new(),
        );
        let size = envelope.serialized_len()?;
        if size > self.max_envelope_size {
            return Err(FactoryError::EnvelopeTooLarge {
                size,
                max: self.max_envelope_size,
            });
        }

        debug!(
            uri = %descriptor.uri,
            provider = storage.provider(),
            "content offloaded behind a pointer envelope"
        );
        Ok(Created::Referenced {
            envelope,
            descriptor,
        })
    }

    fn merged_metadata(&self, caller: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = self.default_metadata.clone();
        merged.extend(caller);
        merged
    }
}
