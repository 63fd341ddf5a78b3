//! Domain entities and errors.

pub mod channel;
pub mod errors;
pub mod policy;
pub mod session;
pub mod tower;

pub use channel::{ChannelId, ChannelSummary};
pub use errors::ClientDbError;
pub use policy::{BlobType, Policy, TxPolicy, DEFAULT_MAX_UPDATES, DEFAULT_SWEEP_FEE_RATE};
pub use session::{
    BackupId, BreachHint, ClientSession, CommittedUpdate, SessionId, SessionStatus, SESSION_ID_LEN,
};
pub use tower::{Tower, TowerId};
