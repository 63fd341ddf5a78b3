//! Record codec.
//!
//! Stored records are serde structs encoded with bincode. Decode failures are
//! reported as [`StoreError::Corrupt`] tagged with the namespace they came
//! from, since by the time a record is unreadable the interesting question is
//! where it lived, not which byte tripped the decoder.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ports::store::{Namespace, StoreError};

/// Encodes a record for storage under `ns`.
pub fn encode<T: Serialize>(ns: Namespace, record: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(record).map_err(|e| StoreError::corrupt(ns, e.to_string()))
}

/// Decodes a record read from `ns`.
pub fn decode<T: DeserializeOwned>(ns: Namespace, bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::corrupt(ns, e.to_string()))
}
