//! Session ledger operations: key index reservation, session creation and
//! listing, and the commit/ack update protocol.

use std::collections::HashMap;

use crate::adapters::codec;
use crate::domain::errors::ClientDbError;
use crate::domain::policy::BlobType;
use crate::domain::session::{BackupId, ClientSession, CommittedUpdate, SessionId, SessionStatus};
use crate::domain::tower::TowerId;
use crate::ports::store::{Namespace, StoreError, StoreTx, TxStore};

use super::ClientDb;

/// Callback invoked once per acked update during a session listing.
type PerAckedUpdate<'a> = &'a mut dyn FnMut(&ClientSession, u16, &BackupId);

impl<S: TxStore> ClientDb<S> {
    /// Reserves the session key index for the next session with `tower_id`
    /// under `blob_type`, or returns the reservation already in place.
    ///
    /// The reservation is stable: repeated calls, including across restarts,
    /// return the same index until [`ClientDb::create_client_session`]
    /// consumes it. Indexes come from a global counter starting at 1, so an
    /// index is never 0 and never handed out twice.
    pub fn next_session_key_index(
        &self,
        tower_id: TowerId,
        blob_type: BlobType,
    ) -> Result<u32, ClientDbError> {
        self.store.update(|tx| {
            let key = super::key_index_key(tower_id, blob_type);
            if let Some(raw) = tx.get(Namespace::SessionKeyIndexes, &key)? {
                return decode_key_index(&raw);
            }

            let index = super::next_key_index(tx)?;
            tx.put(Namespace::SessionKeyIndexes, &key, &index.to_be_bytes())?;
            Ok(index)
        })
    }

    /// Inserts a freshly negotiated session, consuming its key index
    /// reservation.
    ///
    /// The session must carry the exact index reserved for its tower and
    /// blob type. It is stored normalized: active, `seq_num` and
    /// `last_applied` at 0, no committed or acked updates, whatever the
    /// caller put in those fields.
    pub fn create_client_session(&self, session: &ClientSession) -> Result<(), ClientDbError> {
        self.store.update(|tx| {
            // A duplicate id must surface as such even though its own
            // reservation was consumed when it was first inserted, so this
            // check runs before any reservation state is consulted.
            if tx.get(Namespace::Sessions, session.id.as_bytes())?.is_some() {
                return Err(ClientDbError::ClientSessionAlreadyExists);
            }

            let key = super::key_index_key(session.tower_id, session.policy.blob_type());
            let reserved = match tx.get(Namespace::SessionKeyIndexes, &key)? {
                Some(raw) => decode_key_index(&raw)?,
                None => return Err(ClientDbError::NoReservedKeyIndex),
            };
            if reserved != session.key_index {
                return Err(ClientDbError::IncorrectKeyIndex);
            }

            tx.delete(Namespace::SessionKeyIndexes, &key)?;

            let mut stored = session.clone();
            stored.status = SessionStatus::Active;
            stored.seq_num = 0;
            stored.last_applied = 0;
            super::put_session(tx, &stored)
        })
    }

    /// Lists sessions, optionally restricted to one tower.
    pub fn list_client_sessions(
        &self,
        tower_id: Option<TowerId>,
    ) -> Result<HashMap<SessionId, ClientSession>, ClientDbError> {
        self.store.view(|tx| list_sessions(tx, tower_id, None))
    }

    /// Like [`ClientDb::list_client_sessions`], additionally invoking
    /// `per_acked_update` with the session, sequence number, and backup id
    /// of every acked update encountered during the scan. Callers get
    /// acked-update detail without the returned sessions growing
    /// materialized ledgers.
    pub fn list_client_sessions_with<F>(
        &self,
        tower_id: Option<TowerId>,
        mut per_acked_update: F,
    ) -> Result<HashMap<SessionId, ClientSession>, ClientDbError>
    where
        F: FnMut(&ClientSession, u16, &BackupId),
    {
        self.store
            .view(|tx| list_sessions(tx, tower_id, Some(&mut per_acked_update)))
    }

    /// Records an update as committed to the tower, allocating its sequence
    /// number slot, and returns the tower's last-applied watermark.
    ///
    /// Recommitting the sequence number with the same breach hint is an
    /// idempotent success, so a retry after a lost reply is safe. A
    /// different hint at an existing slot is rejected, as is any sequence
    /// number other than the next unallocated one.
    pub fn commit_update(
        &self,
        id: &SessionId,
        update: &CommittedUpdate,
    ) -> Result<u16, ClientDbError> {
        self.store.update(|tx| {
            let mut session = super::get_session(tx, id)?;

            let key = super::update_key(id, update.seq_num);
            if let Some(raw) = tx.get(Namespace::CommittedUpdates, &key)? {
                let existing: CommittedUpdate = codec::decode(Namespace::CommittedUpdates, &raw)?;
                if existing.hint == update.hint {
                    return Ok(session.last_applied);
                }
                return Err(ClientDbError::UpdateAlreadyCommitted);
            }

            // The next slot is computed in u32 so a session at u16::MAX
            // cannot wrap into accepting sequence number 0.
            let expected = u32::from(session.seq_num) + 1;
            if u32::from(update.seq_num) != expected {
                return Err(ClientDbError::CommitUnorderedUpdate {
                    seq_num: update.seq_num,
                    expected,
                });
            }

            session.seq_num = update.seq_num;
            super::put_session(tx, &session)?;

            let raw = codec::encode(Namespace::CommittedUpdates, update)?;
            tx.put(Namespace::CommittedUpdates, &key, &raw)?;

            Ok(session.last_applied)
        })
    }

    /// Acknowledges the committed update at `seq_num` and advances the
    /// session's last-applied watermark to the value echoed by the tower.
    ///
    /// The committed update is removed and its backup id is retained in the
    /// acked ledger. Validation order is fixed and observable: unknown
    /// session first, then the watermark against the allocation high-water
    /// mark, then watermark regression, then the committed update lookup.
    pub fn ack_update(
        &self,
        id: &SessionId,
        seq_num: u16,
        last_applied: u16,
    ) -> Result<(), ClientDbError> {
        self.store.update(|tx| {
            let mut session = super::get_session(tx, id)?;

            if last_applied > session.seq_num {
                return Err(ClientDbError::UnallocatedLastApplied {
                    last_applied,
                    seq_num: session.seq_num,
                });
            }
            if last_applied < session.last_applied {
                return Err(ClientDbError::LastAppliedReversion {
                    last_applied,
                    stored: session.last_applied,
                });
            }

            let key = super::update_key(id, seq_num);
            let raw = match tx.get(Namespace::CommittedUpdates, &key)? {
                Some(raw) => raw,
                None => return Err(ClientDbError::CommittedUpdateNotFound { seq_num }),
            };
            let update: CommittedUpdate = codec::decode(Namespace::CommittedUpdates, &raw)?;

            tx.delete(Namespace::CommittedUpdates, &key)?;
            let backup = codec::encode(Namespace::AckedUpdates, &update.backup_id)?;
            tx.put(Namespace::AckedUpdates, &key, &backup)?;

            session.last_applied = last_applied;
            super::put_session(tx, &session)
        })
    }

    /// All committed (unacked) updates of a session, ascending by sequence
    /// number. Unknown sessions are an error, not an empty ledger.
    pub fn fetch_session_committed_updates(
        &self,
        id: &SessionId,
    ) -> Result<Vec<CommittedUpdate>, ClientDbError> {
        self.store.view(|tx| {
            super::get_session(tx, id)?;

            let mut updates = Vec::new();
            for (_, value) in tx.scan_prefix(Namespace::CommittedUpdates, id.as_bytes())? {
                updates.push(codec::decode(Namespace::CommittedUpdates, &value)?);
            }
            Ok(updates)
        })
    }
}

fn list_sessions(
    tx: &dyn StoreTx,
    tower_id: Option<TowerId>,
    mut per_acked_update: Option<PerAckedUpdate<'_>>,
) -> Result<HashMap<SessionId, ClientSession>, ClientDbError> {
    let mut sessions = HashMap::new();

    for (_, value) in tx.scan_prefix(Namespace::Sessions, &[])? {
        let session: ClientSession = codec::decode(Namespace::Sessions, &value)?;
        if let Some(tower_id) = tower_id {
            if session.tower_id != tower_id {
                continue;
            }
        }

        if let Some(cb) = per_acked_update.as_mut() {
            for (key, value) in tx.scan_prefix(Namespace::AckedUpdates, session.id.as_bytes())? {
                let seq_num = super::update_seq_from_key(Namespace::AckedUpdates, &key)?;
                let backup_id: BackupId = codec::decode(Namespace::AckedUpdates, &value)?;
                cb(&session, seq_num, &backup_id);
            }
        }

        sessions.insert(session.id, session);
    }

    Ok(sessions)
}

fn decode_key_index(bytes: &[u8]) -> Result<u32, ClientDbError> {
    let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
        StoreError::corrupt(Namespace::SessionKeyIndexes, "Key index is not 4 bytes")
    })?;
    Ok(u32::from_be_bytes(bytes))
}
