//! Client seams for Courier's external systems.
//!
//! Each backing system the storage layer talks to — a key-value cache, a
//! contract ledger, an append-only memo ledger, and a content-addressable
//! node — is reached through an async trait defined here. Stores own their
//! client handle (`Arc<dyn ...>`) from construction: connect once, reuse,
//! no global singletons.
//!
//! The in-memory implementations serve tests and embedded deployments;
//! production deployments plug real network clients in behind the same
//! traits.

pub mod error;
pub mod kv;
pub mod ledger;
pub mod memo;
pub mod node;

pub use error::{ClientError, ClientResult};
pub use kv::{KvClient, MemoryKv};
pub use ledger::{LedgerClient, MemoryLedger, TxReceipt};
pub use memo::{Memo, MemoLedgerClient, MemoReceipt, MemoryMemoLedger};
pub use node::{ContentNode, FailingNode, MemoryNode};
