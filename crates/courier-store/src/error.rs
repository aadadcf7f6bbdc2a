use courier_clients::ClientError;
use courier_types::TypeError;

/// Errors from envelope store backends.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeStoreError {
    /// Malformed input rejected before any backend call.
    #[error("{0}")]
    Validation(String),

    /// An envelope serialized larger than the memo size cap.
    #[error("envelope serializes to {size} bytes, exceeds the {cap}-byte memo cap")]
    MemoTooLarge { size: u64, cap: u64 },

    /// No store holds the envelope. `searched` names every store searched.
    #[error("envelope {id} not found in {searched}")]
    NotFound { id: String, searched: String },

    /// A permanent capability gap of the backend, not a transient failure.
    #[error("{backend} store does not support {operation}")]
    UnsupportedOperation {
        backend: &'static str,
        operation: &'static str,
    },

    /// The backend cannot answer this query without external indexing.
    #[error("{backend} store cannot answer {query} queries")]
    UnsupportedQuery {
        backend: &'static str,
        query: &'static str,
    },

    /// Underlying client failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Stored bytes failed to decode.
    #[error("codec failure: {0}")]
    Codec(String),
}

impl From<TypeError> for EnvelopeStoreError {
    fn from(err: TypeError) -> Self {
        Self::Codec(err.to_string())
    }
}

impl EnvelopeStoreError {
    /// NotFound for a single-backend miss.
    pub(crate) fn not_found(id: impl std::fmt::Display, store: &str) -> Self {
        Self::NotFound {
            id: id.to_string(),
            searched: store.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, EnvelopeStoreError>;
