use courier_content::ContentStorageError;
use courier_types::{MessageType, TypeError};

/// Errors from envelope creation and reconstruction.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// The envelope serialized larger than the configured limit and no
    /// large-content strategy applies.
    #[error("envelope is {size} bytes, exceeds the {max}-byte limit")]
    EnvelopeTooLarge { size: u64, max: u64 },

    /// The configured limit leaves no room for content once envelope
    /// framing is accounted for.
    #[error("size limit {max} leaves no room for content below the {overhead}-byte envelope overhead")]
    LimitTooSmall { max: u64, overhead: u64 },

    /// A produced chunk envelope exceeded the configured limit.
    #[error("chunk {part_number} serialized to {size} bytes, exceeds the {max}-byte limit")]
    ChunkTooLarge {
        part_number: u32,
        size: u64,
        max: u64,
    },

    /// Reconstruction was asked to assemble nothing.
    #[error("cannot reconstruct content from an empty envelope list")]
    NoEnvelopes,

    /// A reconstruction input was not a multipart part envelope.
    #[error("envelope {index} is {found}, expected multipart_message_part")]
    NotMultipart { index: usize, found: MessageType },

    /// A part belongs to a different multipart message.
    #[error("part {part_number} carries message id {actual}, expected {expected}")]
    MessageIdMismatch {
        part_number: u32,
        expected: String,
        actual: String,
    },

    /// A part disagrees about the hash of the complete message.
    #[error("part {part_number} carries complete-message hash {actual}, expected {expected}")]
    MessageHashMismatch {
        part_number: u32,
        expected: String,
        actual: String,
    },

    /// The ordered part numbers are not the exact sequence `1..=total`.
    #[error("expected part {expected} next in sequence, found part {actual}")]
    PartSequence { expected: u32, actual: u32 },

    /// A part disagrees about how many parts the message has.
    #[error("part {part_number} declares {actual} total parts, expected {expected}")]
    TotalPartsMismatch {
        part_number: u32,
        expected: u32,
        actual: u32,
    },

    /// The number of parts supplied differs from the declared total.
    #[error("have {actual} parts of a declared {expected}")]
    PartCountMismatch { expected: u32, actual: u32 },

    /// The reassembled bytes do not hash to the declared complete-message
    /// hash.
    #[error("reconstructed content hashes to {computed}, expected {expected}")]
    ReconstructedHashMismatch { expected: String, computed: String },

    /// Envelope or payload codec failure.
    #[error(transparent)]
    Codec(#[from] TypeError),

    /// A content storage backend failed while offloading or chunking.
    #[error(transparent)]
    Storage(#[from] ContentStorageError),
}

pub type FactoryResult<T> = Result<T, FactoryError>;
