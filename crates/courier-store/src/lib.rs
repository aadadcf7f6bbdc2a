//! Envelope persistence for Courier.
//!
//! [`EnvelopeStore`] is the async persistence seam: every backend stores
//! envelopes under their content-addressed [`EnvelopeId`] and answers the
//! same query surface. Backends differ in durability and capability:
//!
//! - [`MemoryEnvelopeStore`] — `RwLock`-guarded maps, for tests and
//!   embedding.
//! - [`CacheEnvelopeStore`] — key-value store with secondary indices for
//!   content-hash, context, and sender queries.
//! - [`LedgerEnvelopeStore`] — immutable contract-backed storage with chain
//!   provenance; deletes and index queries are explicit capability gaps.
//! - [`MemoEnvelopeStore`] — transaction-memo storage under a hard size cap.
//! - [`CompositeEnvelopeStore`] — routes writes to a default backend and
//!   fans reads out across members.
//!
//! [`EnvelopeId`]: courier_types::EnvelopeId

pub mod cache;
pub mod composite;
pub mod error;
pub mod ledger;
pub mod memo;
pub mod memory;
pub mod traits;

pub use cache::CacheEnvelopeStore;
pub use composite::CompositeEnvelopeStore;
pub use error::{EnvelopeStoreError, StoreResult};
pub use ledger::LedgerEnvelopeStore;
pub use memo::{MemoEnvelopeStore, MEMO_CAP};
pub use memory::MemoryEnvelopeStore;
pub use traits::{BackendInfo, EnvelopeStore, SENDER_KEY, STORED_AT_KEY, TIMESTAMP_KEY};
