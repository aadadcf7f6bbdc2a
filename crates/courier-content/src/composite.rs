use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use courier_types::ContentDescriptor;

use crate::error::{ContentResult, ContentStorageError};
use crate::traits::ContentStorage;

/// Dispatches to an ordered list of member backends.
///
/// Writes are deterministic: `store` always uses the first backend.
/// Retrievals route to the first member whose `can_handle` matches the
/// URI's scheme; exactly one member should claim each scheme.
pub struct CompositeContentStorage {
    backends: Vec<Arc<dyn ContentStorage>>,
}

impl std::fmt::Debug for CompositeContentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeContentStorage")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.provider()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CompositeContentStorage {
    /// Build a composite over the given backends.
    ///
    /// Fails if the list is empty — a composite with no members could never
    /// store or retrieve anything.
    pub fn new(backends: Vec<Arc<dyn ContentStorage>>) -> ContentResult<Self> {
        if backends.is_empty() {
            return Err(ContentStorageError::Validation(
                "no content storage backends configured".into(),
            ));
        }
        Ok(Self { backends })
    }

    /// Number of member backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    fn backend_for(&self, uri: &str) -> Option<&Arc<dyn ContentStorage>> {
        self.backends.iter().find(|b| b.can_handle(uri))
    }
}

#[async_trait]
impl ContentStorage for CompositeContentStorage {
    async fn store(&self, content: &[u8], content_type: &str) -> ContentResult<ContentDescriptor> {
        // Deterministic default write path.
        self.backends[0].store(content, content_type).await
    }

    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>> {
        let backend = self.backend_for(&descriptor.uri).ok_or_else(|| {
            ContentStorageError::Validation(format!(
                "no storage backend can handle URI: {}",
                descriptor.uri
            ))
        })?;
        debug!(uri = %descriptor.uri, provider = backend.provider(), "composite dispatch");
        backend.retrieve(descriptor).await
    }

    fn can_handle(&self, uri: &str) -> bool {
        self.backends.iter().any(|b| b.can_handle(uri))
    }

    fn provider(&self) -> &'static str {
        "composite"
    }
}
