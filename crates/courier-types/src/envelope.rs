use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::{ContentHash, EnvelopeId};

/// What an envelope's `message` payload contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A complete message: the payload is a serialized [`CoreMessage`].
    CoreMessage,
    /// One chunk of an oversized message: the payload is a serialized
    /// [`MultiPartMessagePart`].
    MultiPartMessagePart,
}

impl MessageType {
    /// Wire code from the external schema.
    pub fn code(&self) -> u32 {
        match self {
            Self::CoreMessage => 0,
            Self::MultiPartMessagePart => 1,
        }
    }

    /// Parse from a wire code.
    pub fn from_code(code: u32) -> Result<Self, TypeError> {
        match code {
            0 => Ok(Self::CoreMessage),
            1 => Ok(Self::MultiPartMessagePart),
            _ => Err(TypeError::UnknownCode {
                kind: "message type",
                code,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoreMessage => write!(f, "core_message"),
            Self::MultiPartMessagePart => write!(f, "multipart_message_part"),
        }
    }
}

/// How an envelope's payload is protected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionMode {
    /// Payload is plaintext.
    None,
    /// Payload is protected with a shared secret.
    Protected,
    /// Payload is encrypted to a recipient public key.
    PublicKey,
}

impl EncryptionMode {
    /// Wire code from the external schema.
    pub fn code(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Protected => 1,
            Self::PublicKey => 2,
        }
    }

    /// Parse from a wire code.
    pub fn from_code(code: u32) -> Result<Self, TypeError> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Protected),
            2 => Ok(Self::PublicKey),
            _ => Err(TypeError::UnknownCode {
                kind: "encryption mode",
                code,
            }),
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Protected => write!(f, "protected"),
            Self::PublicKey => write!(f, "public_key"),
        }
    }
}

/// Canonical transport unit: an opaque payload plus addressing and
/// encryption metadata.
///
/// `content_hash` is fixed at creation as the hash of `message` and never
/// mutated afterwards. The `metadata` map is the one mutable surface: storage
/// backends write provenance keys (`transaction_hash`, `block_number`, ...)
/// into it after a successful store.
///
/// Metadata is a `BTreeMap` so serialization is canonical: the same logical
/// envelope always produces the same wire bytes and therefore the same
/// [`EnvelopeId`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub content_hash: ContentHash,
    pub message_type: MessageType,
    pub encryption: EncryptionMode,
    pub message: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub reply_to: String,
    pub public_references: Vec<ContentHash>,
}

impl Envelope {
    /// Current envelope schema version.
    pub const VERSION: u32 = 1;

    /// Build an envelope around a payload, fixing `content_hash` to the
    /// hash of `message`.
    pub fn new(
        message_type: MessageType,
        encryption: EncryptionMode,
        message: Vec<u8>,
        metadata: BTreeMap<String, String>,
        public_references: Vec<ContentHash>,
    ) -> Self {
        let content_hash = ContentHash::of(&message);
        Self {
            version: Self::VERSION,
            content_hash,
            message_type,
            encryption,
            message,
            metadata,
            reply_to: String::new(),
            public_references,
        }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        bincode::serialize(self).map_err(|e| TypeError::Codec(e.to_string()))
    }

    /// Deserialize from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        bincode::deserialize(bytes).map_err(|e| TypeError::Codec(e.to_string()))
    }

    /// Size of the serialized envelope in bytes.
    pub fn serialized_len(&self) -> Result<u64, TypeError> {
        bincode::serialized_size(self).map_err(|e| TypeError::Codec(e.to_string()))
    }

    /// Content-addressed store key: hash of the serialized envelope.
    pub fn id(&self) -> Result<EnvelopeId, TypeError> {
        Ok(EnvelopeId::of(&self.to_bytes()?))
    }

    /// Returns `true` if the payload hashes to `content_hash`.
    pub fn verify_content_hash(&self) -> bool {
        self.content_hash.verify(&self.message)
    }
}

/// A complete message payload: content plus the contexts it references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMessage {
    pub content: Vec<u8>,
    pub context_references: Vec<ContentHash>,
    pub metadata: BTreeMap<String, String>,
}

impl CoreMessage {
    pub fn new(content: Vec<u8>, context_references: Vec<ContentHash>) -> Self {
        Self {
            content,
            context_references,
            metadata: BTreeMap::new(),
        }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        bincode::serialize(self).map_err(|e| TypeError::Codec(e.to_string()))
    }

    /// Deserialize from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        bincode::deserialize(bytes).map_err(|e| TypeError::Codec(e.to_string()))
    }
}

/// One ordered chunk of an oversized message.
///
/// All parts sharing a `message_id` share the same `total_parts` and
/// `complete_message_hash`; concatenating their `content` ordered by
/// `part_number` reproduces the original bytes, whose hash equals
/// `complete_message_hash`. Part numbers are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPartMessagePart {
    pub message_id: String,
    pub part_number: u32,
    pub total_parts: u32,
    pub content: Vec<u8>,
    pub complete_message_hash: ContentHash,
}

impl MultiPartMessagePart {
    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        bincode::serialize(self).map_err(|e| TypeError::Codec(e.to_string()))
    }

    /// Deserialize from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        bincode::deserialize(bytes).map_err(|e| TypeError::Codec(e.to_string()))
    }
}
