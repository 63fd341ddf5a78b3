//! Scenarios covering the full database surface: tower registration and
//! removal, session key reservation, session creation and listing, the
//! commit/ack update protocol, and channel summaries.
//!
//! Each scenario is written once, generically over the store backend, and
//! expanded into a test per backend variant. Negative paths matter as much
//! as positive ones here; every backend has to fail identically.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use wtclient_db::{
        BackupId, BlobType, ChannelId, ClientDbError, ClientSession, SessionId, TowerId, TxStore,
    };

    use crate::harness::{
        addr, pseudo_addr, rand_bytes, rand_committed_update, rand_pubkey, session_id,
        test_policy, Harness,
    };

    // =========================================================================
    // BACKEND MATRIX
    // =========================================================================

    /// Expands each scenario into one test per backend variant.
    macro_rules! backend_matrix {
        ($($scenario:ident),* $(,)?) => {
            $(
                mod $scenario {
                    #[test]
                    fn memory() {
                        super::$scenario(crate::harness::memory_harness());
                    }

                    #[test]
                    fn fresh_rocks() {
                        super::$scenario(crate::harness::fresh_rocks_harness());
                    }

                    #[test]
                    fn reopened_rocks() {
                        super::$scenario(crate::harness::reopened_rocks_harness());
                    }
                }
            )*
        };
    }

    backend_matrix!(
        create_client_session,
        filter_client_sessions,
        create_tower,
        remove_tower,
        chan_summaries,
        commit_update,
        ack_update,
    );

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    /// Sessions can only be created against a reserved key index, with the
    /// matching index, and only once per id.
    fn create_client_session<S: TxStore>(h: Harness<S>) {
        let blob_type = BlobType::ALTRUIST_ANCHOR_COMMIT;
        let tower = h.new_tower();

        let mut session = ClientSession::new(
            session_id(1),
            tower.id,
            0,
            test_policy(blob_type),
            vec![0x01, 0x02, 0x03],
        );

        // Not present yet.
        assert!(!h.list_sessions(None).contains_key(&session.id));

        // No reservation yet.
        h.insert_session(&session, Some(ClientDbError::NoReservedKeyIndex));

        let key_index = h.next_key_index(tower.id, blob_type);

        // The session still carries index 0, which cannot match the
        // reservation.
        h.insert_session(&session, Some(ClientDbError::IncorrectKeyIndex));

        // Reserving again before the index is consumed returns the same
        // index, so a client that restarts mid-negotiation resumes where it
        // was.
        let key_index2 = h.next_key_index(tower.id, blob_type);
        assert_eq!(key_index, key_index2);

        session.key_index = key_index;
        h.insert_session(&session, None);
        assert!(h.list_sessions(None).contains_key(&session.id));

        // Same id again.
        h.insert_session(&session, Some(ClientDbError::ClientSessionAlreadyExists));

        // The reservation was consumed, so the next one is a fresh index.
        let key_index3 = h.next_key_index(tower.id, blob_type);
        assert_ne!(key_index, key_index3);
    }

    /// Listing with a tower filter returns exactly that tower's sessions.
    fn filter_client_sessions<S: TxStore>(h: Harness<S>) {
        let blob_type = BlobType::ALTRUIST_COMMIT;

        // Two sessions on the first tower, one on the second.
        let tower1 = h.new_tower();
        let tower2 = h.new_tower();

        let mut tower_sessions: HashMap<TowerId, Vec<SessionId>> = HashMap::new();
        for (i, tower_id) in [tower1.id, tower1.id, tower2.id].into_iter().enumerate() {
            let key_index = h.next_key_index(tower_id, blob_type);
            let id = session_id(i as u8);
            let session = ClientSession::new(
                id,
                tower_id,
                key_index,
                test_policy(blob_type),
                vec![0x01, 0x02, 0x03],
            );
            h.insert_session(&session, None);
            tower_sessions.entry(tower_id).or_default().push(id);
        }

        for (tower_id, expected) in &tower_sessions {
            let sessions = h.list_sessions(Some(*tower_id));
            assert_eq!(sessions.len(), expected.len());
            for id in expected {
                assert!(
                    sessions.contains_key(id),
                    "expected session {} for tower {}",
                    id,
                    tower_id
                );
            }
        }

        // The unfiltered listing sees all of them.
        assert_eq!(h.list_sessions(None).len(), 3);
    }

    /// Tower creation dedupes known addresses and prepends fresh ones, and
    /// lookups by id and by identity key agree with creation.
    fn create_tower<S: TxStore>(h: Harness<S>) {
        // Arbitrary ids do not resolve before any tower exists.
        h.load_tower_by_id(TowerId(20), Some(ClientDbError::TowerNotFound));

        let pk = rand_pubkey();
        let tower = h.create_tower(&pk, pseudo_addr());
        assert_eq!(tower.addresses, vec![pseudo_addr()]);

        assert_eq!(h.load_tower_by_id(tower.id, None), Some(tower.clone()));
        assert_eq!(h.load_tower(&pk, None), Some(tower.clone()));

        // Re-adding the same address leaves the record unchanged.
        let tower_dup = h.create_tower(&pk, pseudo_addr());
        assert_eq!(tower_dup, tower);

        // A new address lands in front as the freshest one.
        let tower_new = h.create_tower(&pk, addr(2));
        assert_eq!(h.load_tower_by_id(tower.id, None), Some(tower_new.clone()));
        assert_eq!(h.load_tower(&pk, None), Some(tower_new.clone()));
        assert_eq!(tower_new.addresses, vec![addr(2), pseudo_addr()]);
    }

    /// Removal distinguishes single addresses, sessionless towers, and
    /// towers whose sessions still hold state.
    fn remove_tower<S: TxStore>(h: Harness<S>) {
        let pk = rand_pubkey();

        // Unknown towers are a silent no-op.
        h.remove_tower(&pk, None, false, None);

        h.create_tower(&pk, addr(1));
        h.create_tower(&pk, addr(2));

        // Drop the second address, then refuse to drop the last one.
        h.remove_tower(&pk, Some(addr(2)), false, None);
        h.remove_tower(
            &pk,
            Some(addr(1)),
            false,
            Some(ClientDbError::LastTowerAddr),
        );

        // Without sessions the tower goes away entirely.
        h.remove_tower(&pk, None, false, None);

        // Recreate it, this time with a session holding a committed update.
        let tower = h.create_tower(&pk, addr(1));
        let blob_type = BlobType::ALTRUIST_COMMIT;
        let session = ClientSession::new(
            session_id(1),
            tower.id,
            h.next_key_index(tower.id, blob_type),
            test_policy(blob_type),
            vec![0x01, 0x02, 0x03],
        );
        h.insert_session(&session, None);
        let update = rand_committed_update(1);
        h.commit_update(&session.id, &update, None);

        // The unacked update blocks full removal.
        h.remove_tower(&pk, None, true, Some(ClientDbError::TowerUnackedUpdates));

        // Once everything is acked, removal parks the sessions instead of
        // deleting the tower.
        h.ack_update(&session.id, 1, 1, None);
        h.remove_tower(&pk, None, true, None);

        // Re-registering flips the parked sessions back to active, which
        // create_tower asserts itself.
        h.create_tower(&pk, addr(1));
    }

    /// Channel registration stores the sweep script exactly once.
    fn chan_summaries<S: TxStore>(h: Harness<S>) {
        let chan_id = ChannelId([0u8; 32]);
        assert!(!h.fetch_chan_summaries().contains_key(&chan_id));

        let script = rand_bytes(22);
        h.register_chan(chan_id, &script, None);

        let summaries = h.fetch_chan_summaries();
        let summary = summaries.get(&chan_id).expect("channel should be registered");
        assert_eq!(summary.sweep_pk_script, script);

        h.register_chan(
            chan_id,
            &script,
            Some(ClientDbError::ChannelAlreadyRegistered),
        );
    }

    /// Commits allocate strictly sequential slots, tolerate identical
    /// retries, and reject conflicting or out-of-order updates.
    fn commit_update<S: TxStore>(h: Harness<S>) {
        let blob_type = BlobType::ALTRUIST_COMMIT;
        let tower = h.new_tower();
        let mut session = ClientSession::new(
            session_id(2),
            tower.id,
            0,
            test_policy(blob_type),
            vec![0x01, 0x02, 0x03],
        );

        // Both committing against and reading from a session that does not
        // exist fail.
        let update1 = rand_committed_update(1);
        h.commit_update(
            &session.id,
            &update1,
            Some(ClientDbError::ClientSessionNotFound),
        );
        h.fetch_committed_updates(&session.id, Some(ClientDbError::ClientSessionNotFound));

        session.key_index = h.next_key_index(tower.id, blob_type);
        h.insert_session(&session, None);

        // Nothing acked yet, so the watermark is 0.
        let last_applied = h.commit_update(&session.id, &update1, None);
        assert_eq!(last_applied, 0);
        h.assert_updates(&session.id, &[update1.clone()], &HashMap::new());

        // Retrying the identical update is idempotent.
        let last_applied = h.commit_update(&session.id, &update1, None);
        assert_eq!(last_applied, 0);
        h.assert_updates(&session.id, &[update1.clone()], &HashMap::new());

        // A different update at the occupied slot is a conflict.
        let mut update2 = rand_committed_update(1);
        h.commit_update(
            &session.id,
            &update2,
            Some(ClientDbError::UpdateAlreadyCommitted),
        );

        // At the next slot it goes through.
        update2.seq_num = 2;
        let last_applied = h.commit_update(&session.id, &update2, None);
        assert_eq!(last_applied, 0);
        h.assert_updates(
            &session.id,
            &[update1.clone(), update2.clone()],
            &HashMap::new(),
        );

        // Skipping ahead is rejected and changes nothing.
        let update4 = rand_committed_update(4);
        h.commit_update(
            &session.id,
            &update4,
            Some(ClientDbError::CommitUnorderedUpdate {
                seq_num: 4,
                expected: 3,
            }),
        );
        h.assert_updates(&session.id, &[update1, update2], &HashMap::new());
    }

    /// Acks consume committed slots exactly once and police the
    /// last-applied watermark in both directions.
    fn ack_update<S: TxStore>(h: Harness<S>) {
        let blob_type = BlobType::ALTRUIST_COMMIT;
        let tower = h.new_tower();
        let mut session = ClientSession::new(
            session_id(3),
            tower.id,
            0,
            test_policy(blob_type),
            vec![0x01, 0x02, 0x03],
        );

        // No session yet.
        h.ack_update(
            &session.id,
            1,
            0,
            Some(ClientDbError::ClientSessionNotFound),
        );

        session.key_index = h.next_key_index(tower.id, blob_type);
        h.insert_session(&session, None);

        // Nothing committed yet.
        h.ack_update(
            &session.id,
            1,
            0,
            Some(ClientDbError::CommittedUpdateNotFound { seq_num: 1 }),
        );

        let update1 = rand_committed_update(1);
        assert_eq!(h.commit_update(&session.id, &update1, None), 0);

        h.ack_update(&session.id, 1, 1, None);

        // The slot is gone, so acking it again cannot find it.
        h.ack_update(
            &session.id,
            1,
            1,
            Some(ClientDbError::CommittedUpdateNotFound { seq_num: 1 }),
        );

        // The watermark cannot regress.
        h.ack_update(
            &session.id,
            1,
            0,
            Some(ClientDbError::LastAppliedReversion {
                last_applied: 0,
                stored: 1,
            }),
        );

        // Nor can it pass the highest allocated sequence number.
        h.ack_update(
            &session.id,
            4,
            3,
            Some(ClientDbError::UnallocatedLastApplied {
                last_applied: 3,
                seq_num: 1,
            }),
        );

        let acked: HashMap<u16, BackupId> = [(1, update1.backup_id)].into();
        h.assert_updates(&session.id, &[], &acked);

        // The next commit reports the watermark from the ack above.
        let update2 = rand_committed_update(2);
        assert_eq!(h.commit_update(&session.id, &update2, None), 1);

        h.ack_update(&session.id, 2, 2, None);
        let acked: HashMap<u16, BackupId> =
            [(1, update1.backup_id), (2, update2.backup_id)].into();
        h.assert_updates(&session.id, &[], &acked);

        h.ack_update(
            &session.id,
            2,
            1,
            Some(ClientDbError::LastAppliedReversion {
                last_applied: 1,
                stored: 2,
            }),
        );
        h.ack_update(
            &session.id,
            4,
            2,
            Some(ClientDbError::CommittedUpdateNotFound { seq_num: 4 }),
        );
        h.ack_update(
            &session.id,
            4,
            3,
            Some(ClientDbError::UnallocatedLastApplied {
                last_applied: 3,
                seq_num: 2,
            }),
        );
    }
}
