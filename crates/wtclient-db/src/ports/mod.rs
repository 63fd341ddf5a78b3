//! Port traits for the watchtower client database.
//!
//! The database core talks to storage exclusively through the
//! [`store::TxStore`] capability, so every backend that can run atomic
//! transactions over namespaced key-value records can host it.

pub mod store;

pub use store::{Namespace, StoreError, StoreTx, TxStore};
