//! Envelope creation and reconstruction for Courier.
//!
//! The [`EnvelopeFactory`] is the single entry point for turning raw content
//! into transport envelopes. Content that fits the configured size limit
//! becomes one CORE_MESSAGE envelope; oversized content is handled by a
//! [`LargeContentStrategy`]: split into ordered MULTIPART_MESSAGE_PART
//! envelopes, offloaded to an external content store with a pointer envelope
//! left behind, or rejected outright.
//!
//! [`reconstruct_content`] is the inverse of chunking: it validates a set of
//! part envelopes as a complete, consistent sequence and returns the original
//! bytes, or fails on the first protocol violation without ever returning
//! partial data.

pub mod error;
pub mod factory;
pub mod reconstruct;

pub use error::{FactoryError, FactoryResult};
pub use factory::{
    Created, EnvelopeFactory, LargeContentStrategy, CONTENT_HASH_KEY, CONTENT_TYPE_KEY,
    CONTENT_URI_KEY, ENVELOPE_OVERHEAD,
};
pub use reconstruct::reconstruct_content;
