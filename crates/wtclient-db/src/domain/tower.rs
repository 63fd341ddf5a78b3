//! Tower registry entities.

use std::fmt;
use std::net::SocketAddr;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Database-assigned tower identifier.
///
/// Allocated from a counter that starts at 1 and only grows, so an id is
/// never 0 and never reused, even after its tower is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(pub u64);

impl TowerId {
    /// Big-endian form, used as the tower record key.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub(crate) fn from_be_slice(bytes: &[u8]) -> Option<TowerId> {
        let bytes: [u8; 8] = bytes.try_into().ok()?;
        Some(TowerId(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered watchtower endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tower {
    pub id: TowerId,
    /// Compressed secp256k1 key the tower authenticates with.
    pub identity_key: PublicKey,
    /// Known network addresses, most recently added first.
    pub addresses: Vec<SocketAddr>,
}

impl Tower {
    /// Prepends `addr` as the freshest address. Known addresses are left
    /// where they are.
    pub fn add_address(&mut self, addr: SocketAddr) {
        if self.addresses.contains(&addr) {
            return;
        }
        self.addresses.insert(0, addr);
    }

    /// Drops `addr` from the address list; unknown addresses are ignored.
    /// Whether the resulting list may be empty is the caller's rule to
    /// enforce.
    pub fn remove_address(&mut self, addr: &SocketAddr) {
        self.addresses.retain(|a| a != addr);
    }
}
