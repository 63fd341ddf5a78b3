//! Session policy types.
//!
//! A session's policy is negotiated with the tower before any state reaches
//! this crate; it is stored verbatim so the client can resume sessions with
//! the terms it agreed to. The blob type doubles as part of the session key
//! index reservation key, since towers price different payload kinds
//! independently.

use serde::{Deserialize, Serialize};

/// Fee rate assumed for justice transactions when none was negotiated,
/// in satoshis per 1000 weight units.
pub const DEFAULT_SWEEP_FEE_RATE: u64 = 2500;

/// Default cap on the number of updates a session may hold.
pub const DEFAULT_MAX_UPDATES: u16 = 1024;

/// Bit-flag encoding of the justice blob kind a session carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobType(u16);

impl BlobType {
    /// The tower keeps a cut of the swept funds.
    pub const FLAG_REWARD: BlobType = BlobType(1);
    /// The blob sweeps commitment outputs.
    pub const FLAG_COMMIT_OUTPUTS: BlobType = BlobType(1 << 1);
    /// The blob spends from an anchor commitment.
    pub const FLAG_ANCHOR_CHANNEL: BlobType = BlobType(1 << 2);
    /// The blob spends from a taproot commitment.
    pub const FLAG_TAPROOT_CHANNEL: BlobType = BlobType(1 << 3);

    /// Altruist sweep of a legacy commitment.
    pub const ALTRUIST_COMMIT: BlobType = BlobType(Self::FLAG_COMMIT_OUTPUTS.0);
    /// Altruist sweep of an anchor commitment.
    pub const ALTRUIST_ANCHOR_COMMIT: BlobType =
        BlobType(Self::FLAG_ANCHOR_CHANNEL.0 | Self::FLAG_COMMIT_OUTPUTS.0);
    /// Reward sweep of a legacy commitment.
    pub const REWARD_COMMIT: BlobType = BlobType(Self::FLAG_COMMIT_OUTPUTS.0 | Self::FLAG_REWARD.0);

    /// Whether every flag in `flags` is set.
    pub fn has(self, flags: BlobType) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// Whether the tower takes a reward cut.
    pub fn has_reward(self) -> bool {
        self.has(Self::FLAG_REWARD)
    }

    /// Big-endian wire form, used in reservation keys.
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

/// The transaction-shaping half of a policy: what kind of justice blob the
/// session carries and the fee rate it commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxPolicy {
    pub blob_type: BlobType,
    /// Fee rate of the justice transaction, in satoshis per 1000 weight.
    pub sweep_fee_rate: u64,
}

impl Default for TxPolicy {
    fn default() -> Self {
        Self {
            blob_type: BlobType::ALTRUIST_COMMIT,
            sweep_fee_rate: DEFAULT_SWEEP_FEE_RATE,
        }
    }
}

/// Full negotiated session policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    pub tx_policy: TxPolicy,
    /// Maximum number of updates the session may hold.
    pub max_updates: u16,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            tx_policy: TxPolicy::default(),
            max_updates: DEFAULT_MAX_UPDATES,
        }
    }
}

impl Policy {
    pub fn blob_type(&self) -> BlobType {
        self.tx_policy.blob_type
    }
}
