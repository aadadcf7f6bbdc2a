/// Errors from external-system clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The remote system could not be reached.
    #[error("connection to {backend} failed: {reason}")]
    Connection {
        backend: &'static str,
        reason: String,
    },

    /// The remote system rejected or failed the request.
    #[error("{backend} request failed: {reason}")]
    Request {
        backend: &'static str,
        reason: String,
    },
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
