use courier_clients::ClientError;

/// Errors from content storage operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentStorageError {
    /// Malformed input: a URI this backend cannot parse, missing descriptor
    /// metadata, or an unroutable scheme.
    #[error("validation error: {0}")]
    Validation(String),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {uri}: expected {expected}, computed {computed}")]
    HashMismatch {
        uri: String,
        expected: String,
        computed: String,
    },

    /// The content behind the URI is absent.
    #[error("content not found: {uri}")]
    NotFound { uri: String },

    /// Permanent capability gap on this backend.
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// Failure in the underlying client connection.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Serialization or deserialization failure.
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<courier_types::TypeError> for ContentStorageError {
    fn from(err: courier_types::TypeError) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result alias for content storage operations.
pub type ContentResult<T> = Result<T, ContentStorageError>;
