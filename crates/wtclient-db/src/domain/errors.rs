use thiserror::Error;

use crate::ports::store::StoreError;

/// Errors returned by the watchtower client database.
///
/// Any failed operation rolled its transaction back; no variant leaves
/// partial state behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientDbError {
    #[error("Tower not found")]
    TowerNotFound,

    #[error("Cannot remove the last address of a tower")]
    LastTowerAddr,

    #[error("Tower has sessions with unacked updates")]
    TowerUnackedUpdates,

    #[error("No session key index reserved for this tower and blob type")]
    NoReservedKeyIndex,

    #[error("Session key index does not match the reserved index")]
    IncorrectKeyIndex,

    #[error("Session key indexes exhausted")]
    SessionKeyIndexExhausted,

    #[error("Client session already exists")]
    ClientSessionAlreadyExists,

    #[error("Client session not found")]
    ClientSessionNotFound,

    #[error("Update already committed with a different breach hint")]
    UpdateAlreadyCommitted,

    // `expected` is u32 so the slot after u16::MAX reports as 65536, not
    // as the already-allocated top slot.
    #[error("Unordered commit: got sequence number {seq_num}, expected {expected}")]
    CommitUnorderedUpdate { seq_num: u16, expected: u32 },

    #[error("No committed update at sequence number {seq_num}")]
    CommittedUpdateNotFound { seq_num: u16 },

    #[error("Last applied {last_applied} regresses below stored {stored}")]
    LastAppliedReversion { last_applied: u16, stored: u16 },

    #[error("Last applied {last_applied} exceeds highest allocated sequence number {seq_num}")]
    UnallocatedLastApplied { last_applied: u16, seq_num: u16 },

    #[error("Channel already registered")]
    ChannelAlreadyRegistered,

    #[error("Database version {found} is newer than supported version {supported}")]
    UnsupportedDbVersion { found: u32, supported: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
