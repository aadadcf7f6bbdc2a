use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use courier_types::{ContentHash, Envelope, EnvelopeId};

use crate::error::StoreResult;

/// Envelope metadata key naming the sending party.
pub const SENDER_KEY: &str = "sender";

/// Envelope metadata key carrying the send timestamp, seconds since the
/// Unix epoch. Used to order sender listings.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Provenance metadata key: RFC 3339 instant a backend accepted the write.
pub const STORED_AT_KEY: &str = "stored_at";

/// A description of a store backend and its current shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub backend_type: String,
    /// Envelope count where the backend can cheaply answer it.
    pub envelope_count: Option<u64>,
    pub details: BTreeMap<String, String>,
    /// Member infos for composite backends.
    pub members: Vec<BackendInfo>,
}

impl BackendInfo {
    pub fn new(name: impl Into<String>, backend_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend_type: backend_type.into(),
            envelope_count: None,
            details: BTreeMap::new(),
            members: Vec::new(),
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.envelope_count = Some(count);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_members(mut self, members: Vec<BackendInfo>) -> Self {
        self.members = members;
        self
    }
}

/// Async persistence seam for envelopes.
///
/// Every backend keys envelopes by their content-addressed [`EnvelopeId`],
/// computed from the serialized bytes at store time. `store` takes the
/// envelope mutably so ledger-backed stores can write provenance
/// (`transaction_hash`, `block_number`, ...) back into its metadata; the id
/// is always derived from the bytes as submitted, before any writeback.
#[async_trait]
pub trait EnvelopeStore: Send + Sync {
    /// Persist an envelope, returning its content-addressed id.
    async fn store(&self, envelope: &mut Envelope) -> StoreResult<EnvelopeId>;

    /// Fetch an envelope by id. Fails with `NotFound` if absent.
    async fn retrieve(&self, id: &EnvelopeId) -> StoreResult<Envelope>;

    /// All stored envelopes whose payload hashes to `hash`.
    async fn find_by_content_hash(&self, hash: &ContentHash) -> StoreResult<Vec<Envelope>>;

    /// All stored envelopes publicly referencing `context`.
    async fn find_by_context(&self, context: &ContentHash) -> StoreResult<Vec<Envelope>>;

    /// Most recent envelopes from `sender`, newest first, at most `limit`.
    async fn list_by_sender(&self, sender: &str, limit: usize) -> StoreResult<Vec<Envelope>>;

    /// Remove an envelope. Returns `true` if it was present.
    async fn delete(&self, id: &EnvelopeId) -> StoreResult<bool>;

    /// Returns `true` if the envelope is stored.
    async fn exists(&self, id: &EnvelopeId) -> StoreResult<bool>;

    /// Provenance metadata recorded for a stored envelope.
    async fn envelope_metadata(&self, id: &EnvelopeId) -> StoreResult<BTreeMap<String, String>>;

    /// Describe this backend.
    async fn backend_info(&self) -> BackendInfo;

    /// Short backend name, used in logs and `NotFound` errors.
    fn name(&self) -> &str;
}

/// Seconds-since-epoch score used to order a sender's envelopes. Prefers
/// the envelope's own timestamp metadata, falling back to now.
pub(crate) fn sender_score(envelope: &Envelope) -> f64 {
    envelope
        .metadata
        .get(TIMESTAMP_KEY)
        .and_then(|t| t.parse::<f64>().ok())
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as f64 / 1000.0)
}
