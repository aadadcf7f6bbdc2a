//! Foundation types for Courier.
//!
//! This crate provides the data model shared by every other Courier crate:
//! the envelope wire types, content descriptors, and content-addressed
//! identifiers.
//!
//! # Key Types
//!
//! - [`Envelope`] — Canonical transport unit: opaque payload plus addressing
//!   and encryption metadata
//! - [`ContentHash`] — Content-addressed identifier (BLAKE3 hash of bytes)
//! - [`EnvelopeId`] — Content-addressed store key (hash of a serialized envelope)
//! - [`ContentDescriptor`] — Pointer record (URI + hash + size + type) to
//!   content held by a storage backend
//! - [`MultiPartMessagePart`] — One ordered chunk of an oversized message

pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod hash;

pub use descriptor::ContentDescriptor;
pub use envelope::{CoreMessage, EncryptionMode, Envelope, MessageType, MultiPartMessagePart};
pub use error::TypeError;
pub use hash::{ContentHash, EnvelopeId};
