use courier_content::ContentStorageError;
use courier_envelope::FactoryError;
use courier_store::EnvelopeStoreError;
use courier_types::TypeError;

/// Errors surfaced by the SDK facade.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Configuration failed to parse or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested operation needs wiring the facade was not given.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Store(#[from] EnvelopeStoreError),

    #[error(transparent)]
    Content(#[from] ContentStorageError),

    #[error(transparent)]
    Codec(#[from] TypeError),
}

pub type SdkResult<T> = Result<T, SdkError>;
