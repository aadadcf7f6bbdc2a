//! Content storage backends for Courier.
//!
//! A [`ContentStorage`] stores raw bytes behind a URI and hands back a
//! [`ContentDescriptor`](courier_types::ContentDescriptor) pointing at them.
//! The URI scheme uniquely identifies the responsible backend, which is how
//! [`CompositeContentStorage`] routes retrievals.
//!
//! Backends:
//! - [`InlineStorage`] — content embedded in the descriptor itself
//! - [`NodeStorage`] — content pinned on a content-addressable network node
//! - [`CacheStorage`] — content blobs in a networked key-value cache
//! - [`MultipartStorage`] — chunking into ordered multipart envelopes,
//!   storage-agnostic
//! - [`HttpStorage`] — declared stub for `http(s)://` URIs

pub mod cache;
pub mod composite;
pub mod error;
pub mod http;
pub mod inline;
pub mod multipart;
pub mod node;
pub mod traits;

pub use cache::CacheStorage;
pub use composite::CompositeContentStorage;
pub use error::{ContentStorageError, ContentResult};
pub use http::HttpStorage;
pub use inline::InlineStorage;
pub use multipart::MultipartStorage;
pub use node::NodeStorage;
pub use traits::ContentStorage;
