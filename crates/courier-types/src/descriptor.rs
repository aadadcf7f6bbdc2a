use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Pointer record to content held by some storage backend.
///
/// The URI's scheme uniquely identifies the backend responsible for the
/// content, and `content_hash` always equals the hash of the bytes
/// obtainable through `uri`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub uri: String,
    pub content_type: String,
    pub content_length: u64,
    pub content_hash: ContentHash,
    pub metadata: BTreeMap<String, String>,
}

impl ContentDescriptor {
    pub fn new(
        uri: impl Into<String>,
        content_type: impl Into<String>,
        content_length: u64,
        content_hash: ContentHash,
    ) -> Self {
        Self {
            uri: uri.into(),
            content_type: content_type.into(),
            content_length,
            content_hash,
            metadata: BTreeMap::new(),
        }
    }

    /// The URI scheme (the part before `://`), if the URI has one.
    pub fn scheme(&self) -> Option<&str> {
        scheme_of(&self.uri)
    }

    /// Builder-style metadata insertion.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The scheme of an arbitrary URI string, if it has one.
pub fn scheme_of(uri: &str) -> Option<&str> {
    uri.split_once("://").map(|(scheme, _)| scheme)
}
