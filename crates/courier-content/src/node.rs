use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_clients::{ClientError, ContentNode};
use courier_types::{ContentDescriptor, ContentHash};

use crate::error::{ContentResult, ContentStorageError};
use crate::traits::{ContentStorage, PROVIDER_KEY};

/// Descriptor metadata key marking a degraded (unpinned) store.
pub const DEGRADED_KEY: &str = "degraded";
/// Descriptor metadata key carrying the reason for a degraded store.
pub const DEGRADED_REASON_KEY: &str = "degraded_reason";

/// Stores content on a content-addressable network node.
///
/// Documented degraded mode: when the node is unreachable during `store`,
/// the call does not fail — it returns a deterministic descriptor derived
/// from the content hash, marked degraded. The content is unretrievable
/// until it is re-pinned on a reachable node; use [`NodeStorage::is_degraded`]
/// to detect this before relying on the URI. `retrieve` always requires a
/// live node and propagates failure.
pub struct NodeStorage {
    node: Arc<dyn ContentNode>,
}

impl NodeStorage {
    pub fn new(node: Arc<dyn ContentNode>) -> Self {
        Self { node }
    }

    /// Whether a descriptor came out of the degraded store path.
    pub fn is_degraded(descriptor: &ContentDescriptor) -> bool {
        descriptor.metadata.get(DEGRADED_KEY).map(String::as_str) == Some("true")
    }

    fn cid_of(uri: &str) -> ContentResult<&str> {
        uri.strip_prefix("node://").ok_or_else(|| {
            ContentStorageError::Validation(format!("invalid node URI: {uri}"))
        })
    }
}

#[async_trait]
impl ContentStorage for NodeStorage {
    async fn store(&self, content: &[u8], content_type: &str) -> ContentResult<ContentDescriptor> {
        let content_hash = ContentHash::of(content);

        match self.node.add(content).await {
            Ok(cid) => {
                debug!(cid = %cid, len = content.len(), "content pinned on node");
                Ok(ContentDescriptor::new(
                    format!("node://{cid}"),
                    content_type,
                    content.len() as u64,
                    content_hash,
                )
                .with_metadata(PROVIDER_KEY, self.provider()))
            }
            Err(err @ ClientError::Connection { .. }) => {
                // Degraded fallback: a deterministic CID derived from the
                // content hash stands in until the node is reachable again.
                warn!(
                    hash = %content_hash.short_hex(),
                    reason = %err,
                    "node unreachable; returning degraded descriptor"
                );
                Ok(ContentDescriptor::new(
                    format!("node://{}", content_hash.to_hex()),
                    content_type,
                    content.len() as u64,
                    content_hash,
                )
                .with_metadata(PROVIDER_KEY, self.provider())
                .with_metadata(DEGRADED_KEY, "true")
                .with_metadata(DEGRADED_REASON_KEY, err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn retrieve(&self, descriptor: &ContentDescriptor) -> ContentResult<Vec<u8>> {
        let cid = Self::cid_of(&descriptor.uri)?;
        let content = self.node.cat(cid).await?;
        debug!(cid = %cid, len = content.len(), "content fetched from node");
        Ok(content)
    }

    fn can_handle(&self, uri: &str) -> bool {
        uri.starts_with("node://")
    }

    fn provider(&self) -> &'static str {
        "node"
    }
}
