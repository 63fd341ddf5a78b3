//! Persistence checks specific to the RocksDB backend: whatever a scenario
//! wrote must still be there after the store is closed and reopened, and
//! counters must pick up where they left off instead of reusing values.

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wtclient_db::{BlobType, ChannelId, ClientSession};

    use crate::harness::{
        open_rocks, pseudo_addr, rand_bytes, rand_committed_update, rand_pubkey, session_id,
        test_policy,
    };

    /// Towers, sessions, ledgers, reservations, and channel summaries all
    /// survive a close and reopen.
    #[test]
    fn state_survives_reopen() {
        let dir = TempDir::new().expect("create temp dir");
        let pk = rand_pubkey();
        let chan_id = ChannelId([7u8; 32]);
        let script = rand_bytes(22);
        let blob_type = BlobType::ALTRUIST_COMMIT;

        let (tower_id, session, update, reserved) = {
            let db = open_rocks(dir.path());
            let tower = db.create_tower(&pk, pseudo_addr()).expect("create tower");

            let key_index = db
                .next_session_key_index(tower.id, blob_type)
                .expect("reserve key index");
            let session = ClientSession::new(
                session_id(9),
                tower.id,
                key_index,
                test_policy(blob_type),
                vec![0x01, 0x02, 0x03],
            );
            db.create_client_session(&session).expect("create session");

            let update = rand_committed_update(1);
            db.commit_update(&session.id, &update).expect("commit update");

            db.register_channel(chan_id, script.clone())
                .expect("register channel");

            // A reservation deliberately left pending, to check it survives
            // alongside the consumed one.
            let reserved = db
                .next_session_key_index(tower.id, BlobType::REWARD_COMMIT)
                .expect("reserve second index");

            (tower.id, session, update, reserved)
        };

        let db = open_rocks(dir.path());

        let tower = db.load_tower(&pk).expect("tower survives");
        assert_eq!(tower.id, tower_id);
        assert_eq!(tower.addresses, vec![pseudo_addr()]);

        let sessions = db
            .list_client_sessions(Some(tower_id))
            .expect("list sessions");
        let stored = sessions.get(&session.id).expect("session survives");
        assert_eq!(stored.key_index, session.key_index);
        assert_eq!(stored.seq_num, 1);

        let committed = db
            .fetch_session_committed_updates(&session.id)
            .expect("fetch committed updates");
        assert_eq!(committed, vec![update]);

        let summaries = db.fetch_chan_summaries().expect("fetch summaries");
        assert_eq!(
            summaries.get(&chan_id).expect("summary survives").sweep_pk_script,
            script
        );

        // The pending reservation still answers with the same index.
        assert_eq!(
            db.next_session_key_index(tower_id, BlobType::REWARD_COMMIT)
                .expect("re-read reservation"),
            reserved
        );
    }

    /// Tower id allocation continues after a reopen; ids are never reused
    /// even when the tower that held one was removed.
    #[test]
    fn tower_id_counter_survives_reopen() {
        let dir = TempDir::new().expect("create temp dir");

        let first = {
            let db = open_rocks(dir.path());
            let tower = db
                .create_tower(&rand_pubkey(), pseudo_addr())
                .expect("create tower");

            // Remove it so reuse would be possible if the counter reset.
            db.remove_tower(&tower.identity_key, None)
                .expect("remove tower");
            tower.id
        };

        let db = open_rocks(dir.path());
        let second = db
            .create_tower(&rand_pubkey(), pseudo_addr())
            .expect("create tower");
        assert!(second.id > first, "tower ids must not be reused");
    }
}
