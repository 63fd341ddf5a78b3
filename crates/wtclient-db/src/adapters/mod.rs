//! Store backends and the record codec.

pub mod codec;
pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::{RocksConfig, RocksStore};
