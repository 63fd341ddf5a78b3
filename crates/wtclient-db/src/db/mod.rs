//! The watchtower client database.
//!
//! [`ClientDb`] owns a [`TxStore`] backend and exposes the tower registry,
//! the session ledger, and the channel summary registry. Every public method
//! is one store transaction, so each operation's validation and writes are
//! atomic and the database can be shared behind `&self`.
//!
//! ## Key layout
//!
//! ```text
//! namespace            key                         value
//! -------------------  --------------------------  ----------------
//! towers               tower_id (8, BE)            Tower
//! tower-index          identity_key (33)           tower_id (8, BE)
//! sessions             session_id (33)             ClientSession
//! session-key-indexes  tower_id || blob_type (10)  key_index (4, BE)
//! committed-updates    session_id || seq (35, BE)  CommittedUpdate
//! acked-updates        session_id || seq (35, BE)  BackupId
//! channel-summaries    chan_id (32)                ChannelSummary
//! meta                 named records               version, counters
//! ```
//!
//! Sequence numbers and ids are big-endian in keys so prefix scans return
//! them in numeric order.

mod channels;
mod sessions;
mod towers;


use tracing::info;

use crate::adapters::codec;
use crate::domain::errors::ClientDbError;
use crate::domain::policy::BlobType;
use crate::domain::session::{ClientSession, SessionId, SESSION_ID_LEN};
use crate::domain::tower::TowerId;
use crate::ports::store::{Namespace, StoreError, StoreTx, TxStore};

/// Schema version written by this build.
pub const DB_VERSION: u32 = 1;

const META_VERSION: &[u8] = b"version";
const META_LAST_TOWER_ID: &[u8] = b"last-tower-id";
const META_LAST_KEY_INDEX: &[u8] = b"last-session-key-index";

const UPDATE_KEY_LEN: usize = SESSION_ID_LEN + 2;

/// Client-side watchtower database over a transactional store backend.
pub struct ClientDb<S> {
    store: S,
}

impl<S: TxStore> ClientDb<S> {
    /// Opens the database over `store`, stamping a fresh store with the
    /// current schema version and refusing stores written by a newer build.
    pub fn open(store: S) -> Result<Self, ClientDbError> {
        store.update(init_version)?;
        Ok(ClientDb { store })
    }
}

fn init_version(tx: &mut dyn StoreTx) -> Result<(), ClientDbError> {
    match tx.get(Namespace::Meta, META_VERSION)? {
        Some(raw) => {
            let found: u32 = codec::decode(Namespace::Meta, &raw)?;
            if found > DB_VERSION {
                return Err(ClientDbError::UnsupportedDbVersion {
                    found,
                    supported: DB_VERSION,
                });
            }
            Ok(())
        }
        None => {
            let raw = codec::encode(Namespace::Meta, &DB_VERSION)?;
            tx.put(Namespace::Meta, META_VERSION, &raw)?;
            info!("initialized watchtower client database, schema version {}", DB_VERSION);
            Ok(())
        }
    }
}

/// Allocates the next tower id. Ids start at 1 and the counter only grows,
/// so an id is never reused even after its tower is deleted.
fn next_tower_id(tx: &mut dyn StoreTx) -> Result<TowerId, ClientDbError> {
    let last = match tx.get(Namespace::Meta, META_LAST_TOWER_ID)? {
        Some(raw) => codec::decode::<u64>(Namespace::Meta, &raw)?,
        None => 0,
    };
    let next = last + 1;
    let raw = codec::encode(Namespace::Meta, &next)?;
    tx.put(Namespace::Meta, META_LAST_TOWER_ID, &raw)?;
    Ok(TowerId(next))
}

/// Allocates the next session key index, starting at 1. Capped at
/// `i32::MAX` to stay clear of hardened derivation-path indexes.
fn next_key_index(tx: &mut dyn StoreTx) -> Result<u32, ClientDbError> {
    let last = match tx.get(Namespace::Meta, META_LAST_KEY_INDEX)? {
        Some(raw) => codec::decode::<u32>(Namespace::Meta, &raw)?,
        None => 0,
    };
    if last >= i32::MAX as u32 {
        return Err(ClientDbError::SessionKeyIndexExhausted);
    }
    let next = last + 1;
    let raw = codec::encode(Namespace::Meta, &next)?;
    tx.put(Namespace::Meta, META_LAST_KEY_INDEX, &raw)?;
    Ok(next)
}

fn key_index_key(tower_id: TowerId, blob_type: BlobType) -> [u8; 10] {
    let mut key = [0u8; 10];
    key[..8].copy_from_slice(&tower_id.to_be_bytes());
    key[8..].copy_from_slice(&blob_type.to_be_bytes());
    key
}

/// Key of a committed or acked update: session id followed by the big-endian
/// sequence number.
fn update_key(id: &SessionId, seq_num: u16) -> [u8; UPDATE_KEY_LEN] {
    let mut key = [0u8; UPDATE_KEY_LEN];
    key[..SESSION_ID_LEN].copy_from_slice(id.as_bytes());
    key[SESSION_ID_LEN..].copy_from_slice(&seq_num.to_be_bytes());
    key
}

fn update_seq_from_key(ns: Namespace, key: &[u8]) -> Result<u16, StoreError> {
    if key.len() != UPDATE_KEY_LEN {
        return Err(StoreError::corrupt(
            ns,
            format!("Update key has length {}, want {}", key.len(), UPDATE_KEY_LEN),
        ));
    }
    Ok(u16::from_be_bytes([
        key[SESSION_ID_LEN],
        key[SESSION_ID_LEN + 1],
    ]))
}

fn get_session(tx: &dyn StoreTx, id: &SessionId) -> Result<ClientSession, ClientDbError> {
    let raw = tx
        .get(Namespace::Sessions, id.as_bytes())?
        .ok_or(ClientDbError::ClientSessionNotFound)?;
    Ok(codec::decode(Namespace::Sessions, &raw)?)
}

fn put_session(tx: &mut dyn StoreTx, session: &ClientSession) -> Result<(), ClientDbError> {
    let raw = codec::encode(Namespace::Sessions, session)?;
    tx.put(Namespace::Sessions, session.id.as_bytes(), &raw)?;
    Ok(())
}

/// Every session bound to `tower_id`.
// TODO: maintain a tower-to-session index instead of scanning once towers
// routinely carry more than a handful of sessions.
fn sessions_for_tower(
    tx: &dyn StoreTx,
    tower_id: TowerId,
) -> Result<Vec<ClientSession>, ClientDbError> {
    let mut sessions = Vec::new();
    for (_, value) in tx.scan_prefix(Namespace::Sessions, &[])? {
        let session: ClientSession = codec::decode(Namespace::Sessions, &value)?;
        if session.tower_id == tower_id {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

fn has_committed_updates(tx: &dyn StoreTx, id: &SessionId) -> Result<bool, ClientDbError> {
    let updates = tx.scan_prefix(Namespace::CommittedUpdates, id.as_bytes())?;
    Ok(!updates.is_empty())
}
