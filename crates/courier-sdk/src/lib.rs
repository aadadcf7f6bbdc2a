//! High-level Courier facade.
//!
//! [`CourierConfig`] describes a deployment in TOML; [`Courier`] wires an
//! envelope factory to a composite store so callers can move between raw
//! content and stored envelopes in one call each way: [`Courier::send`]
//! creates and persists every envelope the content needs, and
//! [`Courier::open`] fetches, reassembles, and dereferences back to the
//! original bytes.

pub mod config;
pub mod courier;
pub mod error;

pub use config::{CourierConfig, LargeContent};
pub use courier::Courier;
pub use error::{SdkError, SdkResult};
