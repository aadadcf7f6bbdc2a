use async_trait::async_trait;

use courier_types::ContentDescriptor;

use crate::error::ContentResult;

/// Strategy for storing and retrieving raw content bytes.
///
/// All implementations must satisfy these invariants:
/// - `store` returns a descriptor whose `content_hash` equals the hash of
///   the stored bytes and whose URI scheme this backend `can_handle`.
/// - `retrieve` returns exactly the bytes that were stored; backends that
///   hold the bytes themselves re-verify the hash on read and fail on
///   mismatch rather than returning corrupt data.
/// - Errors are propagated, never swallowed — with one documented exception
///   on [`NodeStorage`](crate::NodeStorage), whose store degrades on a
///   connection failure.
#[async_trait]
pub trait ContentStorage: Send + Sync {
    /// Store content and return a descriptor pointing at it.
    async fn store(&self, content: &[u8], content_type: &str) -> ContentResult<ContentDescriptor>;

    /// Retrieve the bytes behind a descriptor.
    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>>;

    /// Whether this backend is responsible for the URI's scheme.
    fn can_handle(&self, uri: &str) -> bool;

    /// Short provider name recorded in descriptor metadata.
    fn provider(&self) -> &'static str;
}

/// Descriptor metadata key naming the backend that stored the content.
pub const PROVIDER_KEY: &str = "storage_provider";
