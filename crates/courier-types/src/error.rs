/// Errors from type construction and codec operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A decoded value had the wrong length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Serialization or deserialization of a wire type failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// An enum wire code was not recognized.
    #[error("unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: u32 },
}
