use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use courier_types::ContentHash;

use crate::error::{ClientError, ClientResult};

/// Connection to a content-addressable network node.
///
/// The node assigns content identifiers (CIDs); retrieval is by CID only.
#[async_trait]
pub trait ContentNode: Send + Sync {
    /// Add content to the network and return its CID.
    async fn add(&self, content: &[u8]) -> ClientResult<String>;

    /// Fetch content by CID.
    async fn cat(&self, cid: &str) -> ClientResult<Vec<u8>>;
}

/// In-memory content node. CIDs are the hex content hash.
#[derive(Default)]
pub struct MemoryNode {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects pinned on this node.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentNode for MemoryNode {
    async fn add(&self, content: &[u8]) -> ClientResult<String> {
        let cid = ContentHash::of(content).to_hex();
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(cid.clone(), content.to_vec());
        Ok(cid)
    }

    async fn cat(&self, cid: &str) -> ClientResult<Vec<u8>> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(cid)
            .cloned()
            .ok_or_else(|| ClientError::Request {
                backend: "node",
                reason: format!("cid {cid} not found"),
            })
    }
}

/// A node that is always unreachable. Exercises the degraded store path.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingNode;

#[async_trait]
impl ContentNode for FailingNode {
    async fn add(&self, _content: &[u8]) -> ClientResult<String> {
        Err(ClientError::Connection {
            backend: "node",
            reason: "node unreachable".into(),
        })
    }

    async fn cat(&self, _cid: &str) -> ClientResult<Vec<u8>> {
        Err(ClientError::Connection {
            backend: "node",
            reason: "node unreachable".into(),
        })
    }
}
