//! # wtclient-db
//!
//! Client-side watchtower database. A Lightning node that hires remote
//! watchtowers uses this crate as the durable record of that relationship:
//! which towers it knows, which sessions it negotiated with them, which
//! encrypted justice blobs are in flight versus acknowledged, and which
//! channels are registered for backup.
//!
//! ## State machine per session
//!
//! ```text
//!             commit_update(seq = seq_num + 1)
//!   client ──────────────────────────────────────→ committed-updates
//!                                                        │
//!             ack_update(seq, last_applied)              │
//!   tower  ──────────────────────────────────────────────┘
//!                          moves the slot to acked-updates and
//!                          advances the last_applied watermark
//! ```
//!
//! `seq_num` only grows, `last_applied` never regresses and never passes
//! `seq_num`, and a committed slot disappears exactly when it is acked.
//! Every operation runs as one atomic store transaction, so those invariants
//! hold on disk at every instant.
//!
//! ## Crate structure
//!
//! - `domain/` - entities (towers, sessions, policies, channels) and errors
//! - `ports/` - the transactional store contract backends implement
//! - `adapters/` - in-memory and RocksDB backends, record codec
//! - `db/` - the [`ClientDb`] facade exposing every operation
//!
//! ## Usage
//!
//! ```ignore
//! use wtclient_db::{ClientDb, MemoryStore, RocksConfig, RocksStore};
//!
//! // Persistent database.
//! let store = RocksStore::open(RocksConfig::default())?;
//! let db = ClientDb::open(store)?;
//!
//! let tower = db.create_tower(&identity_key, "93.184.216.34:9911".parse()?)?;
//! let index = db.next_session_key_index(tower.id, BlobType::ALTRUIST_COMMIT)?;
//! ```

pub mod adapters;
pub mod db;
pub mod domain;
pub mod ports;

// Re-export key types for convenience
pub use adapters::{MemoryStore, RocksConfig, RocksStore};
pub use db::{ClientDb, DB_VERSION};
pub use domain::{
    BackupId, BlobType, BreachHint, ChannelId, ChannelSummary, ClientDbError, ClientSession,
    CommittedUpdate, Policy, SessionId, SessionStatus, Tower, TowerId, TxPolicy,
    DEFAULT_MAX_UPDATES, DEFAULT_SWEEP_FEE_RATE, SESSION_ID_LEN,
};
pub use ports::{Namespace, StoreError, StoreTx, TxStore};
