//! Session ledger entities.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::domain::channel::ChannelId;
use crate::domain::policy::Policy;
use crate::domain::tower::TowerId;

/// Length of a session identifier in bytes (a compressed session key).
pub const SESSION_ID_LEN: usize = 33;

/// Opaque session identifier.
///
/// Derived from the session key by the negotiation layer; this crate only
/// ever treats it as bytes.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(#[serde_as(as = "[_; 33]")] pub [u8; SESSION_ID_LEN]);

impl SessionId {
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }

    pub(crate) fn from_slice(bytes: &[u8]) -> Option<SessionId> {
        bytes.try_into().ok().map(SessionId)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", hex::encode(self.0))
    }
}

/// Lifecycle state of a session. Sessions are never deleted; removing their
/// tower only disables them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Eligible to carry new backups.
    Active,
    /// Ignored for new backups until the tower is registered again.
    Inactive,
}

/// Breach hint: the short tag the tower matches against transaction ids to
/// recognize a breach without being able to decrypt the blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreachHint(pub [u8; 16]);

impl fmt::Display for BreachHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BreachHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BreachHint({})", hex::encode(self.0))
    }
}

/// Identifies one revoked commitment state of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackupId {
    pub chan_id: ChannelId,
    pub commit_height: u64,
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backup({}, {})", self.chan_id, self.commit_height)
    }
}

/// An update handed to the tower but not yet acknowledged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedUpdate {
    /// Position in the session's update sequence, starting at 1.
    pub seq_num: u16,
    pub backup_id: BackupId,
    pub hint: BreachHint,
    /// Encrypted justice blob, opaque to this layer.
    pub encrypted_blob: Vec<u8>,
}

/// A negotiated slot with a tower.
///
/// `seq_num` and `last_applied` drive the commit/ack protocol: committing
/// allocates the next sequence number, acking confirms the tower processed
/// one and carries the tower's running `last_applied` watermark back to us.
/// Committed and acked updates live in their own namespaces keyed by session
/// id and sequence number; they are never materialized onto this struct.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    pub id: SessionId,
    pub tower_id: TowerId,
    /// Session key index consumed from the reservation at creation.
    pub key_index: u32,
    pub policy: Policy,
    /// Script paying the tower its cut when the policy carries a reward flag.
    pub reward_pk_script: Vec<u8>,
    pub status: SessionStatus,
    /// Highest sequence number ever allocated, 0 before the first commit.
    pub seq_num: u16,
    /// Highest sequence number the tower has confirmed processing.
    pub last_applied: u16,
}

impl ClientSession {
    /// A session in its pre-insertion shape: active, nothing committed.
    pub fn new(
        id: SessionId,
        tower_id: TowerId,
        key_index: u32,
        policy: Policy,
        reward_pk_script: Vec<u8>,
    ) -> Self {
        ClientSession {
            id,
            tower_id,
            key_index,
            policy,
            reward_pk_script,
            status: SessionStatus::Active,
            seq_num: 0,
            last_applied: 0,
        }
    }
}
