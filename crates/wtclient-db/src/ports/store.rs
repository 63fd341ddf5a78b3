//! Transactional key-value store contract.
//!
//! All database state lives in byte-keyed records grouped into a fixed set of
//! independent [`Namespace`]s. Backends expose exactly two entry points:
//! [`TxStore::update`] for read-write transactions and [`TxStore::view`] for
//! read-only ones. Every multi-record invariant in this crate is enforced by
//! running the whole check-and-mutate sequence inside a single `update`
//! closure, so a crash or a mid-sequence validation failure can never leave a
//! partially applied state behind.

use thiserror::Error;

/// Logical record namespaces.
///
/// Each namespace is an independent keyspace: the same byte key in two
/// namespaces refers to two distinct records. Persistent backends map these
/// to RocksDB column families via [`Namespace::name`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Tower id (big-endian u64) to tower record.
    Towers,
    /// Tower identity key (33 bytes, compressed) to tower id.
    TowerIndex,
    /// Session id (33 bytes) to session record.
    Sessions,
    /// Tower id and blob type to the reserved session key index.
    SessionKeyIndexes,
    /// Session id and sequence number to a committed (unacked) update.
    CommittedUpdates,
    /// Session id and sequence number to the backup id of an acked update.
    AckedUpdates,
    /// Channel id (32 bytes) to channel summary.
    ChannelSummaries,
    /// Schema version and allocation counters.
    Meta,
}

impl Namespace {
    /// Every namespace, in declaration order. Backends create all of them at
    /// open so transactions never race namespace creation.
    pub const ALL: [Namespace; 8] = [
        Namespace::Towers,
        Namespace::TowerIndex,
        Namespace::Sessions,
        Namespace::SessionKeyIndexes,
        Namespace::CommittedUpdates,
        Namespace::AckedUpdates,
        Namespace::ChannelSummaries,
        Namespace::Meta,
    ];

    /// Stable on-disk name, used as the RocksDB column-family name.
    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Towers => "towers",
            Namespace::TowerIndex => "tower-index",
            Namespace::Sessions => "sessions",
            Namespace::SessionKeyIndexes => "session-key-indexes",
            Namespace::CommittedUpdates => "committed-updates",
            Namespace::AckedUpdates => "acked-updates",
            Namespace::ChannelSummaries => "channel-summaries",
            Namespace::Meta => "meta",
        }
    }

    pub(crate) fn idx(self) -> usize {
        self as usize
    }
}

/// Failures surfaced by store backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend failed to read, write, or commit.
    #[error("Store I/O failure: {message}")]
    Io { message: String },

    /// A stored record could not be decoded.
    #[error("Corrupt record in namespace {namespace}: {reason}")]
    Corrupt {
        namespace: &'static str,
        reason: String,
    },

    /// The backend could not be opened or configured.
    #[error("Store backend failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub(crate) fn io(message: impl Into<String>) -> Self {
        StoreError::Io {
            message: message.into(),
        }
    }

    pub(crate) fn corrupt(namespace: Namespace, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            namespace: namespace.name(),
            reason: reason.into(),
        }
    }

    pub(crate) fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// Handle to a single open transaction.
///
/// Writes staged through this handle become visible to other transactions
/// only when the enclosing [`TxStore::update`] closure returns `Ok` and the
/// commit succeeds. Reads observe earlier writes of the same transaction.
pub trait StoreTx {
    /// Fetches the record under `key`, or `None` if absent.
    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stages a write of `value` under `key`, replacing any existing record.
    fn put(&mut self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Stages a deletion of `key`. Deleting an absent key succeeds silently.
    fn delete(&mut self, ns: Namespace, key: &[u8]) -> Result<(), StoreError>;

    /// Returns every record whose key starts with `prefix`, ascending by
    /// key. An empty prefix scans the whole namespace. Because multi-byte
    /// integers are encoded big-endian in keys, ascending byte order is
    /// ascending numeric order.
    fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Store capability implemented by every backend.
///
/// `update` transactions are mutually exclusive, so committed transactions
/// form a serial history; `view` transactions read a consistent committed
/// snapshot and never block writers out of deadlock concerns.
pub trait TxStore: Send + Sync {
    /// Runs `f` inside a read-write transaction.
    ///
    /// The transaction commits iff `f` returns `Ok`. On `Err` (or if `f`
    /// panics and unwinds) every staged write is discarded, which is what
    /// makes validation failures inside multi-step operations safe.
    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>;

    /// Runs `f` inside a read-only transaction over committed state.
    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreTx) -> Result<T, E>;
}
