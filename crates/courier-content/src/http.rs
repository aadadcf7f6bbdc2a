use async_trait::async_trait;

use courier_types::ContentDescriptor;

use crate::error::{ContentResult, ContentStorageError};
use crate::traits::ContentStorage;

/// Declared stub for `http://` and `https://` content.
///
/// Routing works — the composite will dispatch such URIs here — but both
/// operations report a capability gap until an HTTP transport lands.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpStorage;

impl HttpStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentStorage for HttpStorage {
    async fn store(&self, _content: &[u8], _content_type: &str) -> ContentResult<ContentDescriptor> {
        Err(ContentStorageError::Unsupported {
            backend: "http",
            operation: "store",
        })
    }

    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>> {
        if !self.can_handle(&descriptor.uri) {
            return Err(ContentStorageError::Validation(format!(
                "invalid HTTP URI: {}",
                descriptor.uri
            )));
        }
        Err(ContentStorageError::Unsupported {
            backend: "http",
            operation: "retrieve",
        })
    }

    fn can_handle(&self, uri: &str) -> bool {
        uri.starts_with("http://") || uri.starts_with("https://")
    }

    fn provider(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_types::ContentHash;

    #[tokio::test]
    async fn handles_both_schemes() {
        let storage = HttpStorage::new();
        assert!(storage.can_handle("http://example.com/blob"));
        assert!(storage.can_handle("https://example.com/blob"));
        assert!(!storage.can_handle("cache://abcd"));
    }

    #[tokio::test]
    async fn operations_report_capability_gap() {
        let storage = HttpStorage::new();
        assert!(matches!(
            storage.store(b"x", "text/plain").await.unwrap_err(),
            ContentStorageError::Unsupported { backend: "http", .. }
        ));

        let desc = ContentDescriptor::new(
            "https://example.com/blob",
            "text/plain",
            0,
            ContentHash::null(),
        );
        assert!(matches!(
            storage.retrieve(&desc).await.unwrap_err(),
            ContentStorageError::Unsupported { backend: "http", .. }
        ));
    }
}
