//! Tower registry operations.

use std::net::SocketAddr;

use secp256k1::PublicKey;
use tracing::debug;

use crate::adapters::codec;
use crate::domain::errors::ClientDbError;
use crate::domain::session::SessionStatus;
use crate::domain::tower::{Tower, TowerId};
use crate::ports::store::{Namespace, StoreError, StoreTx, TxStore};

use super::ClientDb;

impl<S: TxStore> ClientDb<S> {
    /// Registers a tower, or refreshes one already known by its identity key.
    ///
    /// A new identity is assigned the next tower id and stored with the
    /// single address. For a known identity the address is prepended unless
    /// already present, and every inactive session of the tower is flipped
    /// back to active, which is how a previously removed tower comes back
    /// into rotation with its old sessions.
    pub fn create_tower(
        &self,
        identity_key: &PublicKey,
        addr: SocketAddr,
    ) -> Result<Tower, ClientDbError> {
        self.store.update(|tx| {
            let pk_bytes = identity_key.serialize();

            if let Some(id_bytes) = tx.get(Namespace::TowerIndex, &pk_bytes)? {
                let tower_id = decode_tower_id(&id_bytes)?;
                let mut tower = get_tower_by_id(tx, tower_id)?;
                tower.add_address(addr);
                put_tower(tx, &tower)?;

                for mut session in super::sessions_for_tower(tx, tower_id)? {
                    if session.status != SessionStatus::Active {
                        session.status = SessionStatus::Active;
                        super::put_session(tx, &session)?;
                    }
                }

                return Ok(tower);
            }

            let id = super::next_tower_id(tx)?;
            let tower = Tower {
                id,
                identity_key: *identity_key,
                addresses: vec![addr],
            };
            tx.put(Namespace::TowerIndex, &pk_bytes, &id.to_be_bytes())?;
            put_tower(tx, &tower)?;

            debug!("registered tower {} with id {}", identity_key, id);
            Ok(tower)
        })
    }

    /// Removes a tower, or just one of its addresses.
    ///
    /// With `Some(addr)`, only that address is dropped; a tower always keeps
    /// at least one address, so removing the last one fails with
    /// [`ClientDbError::LastTowerAddr`]. With `None`, a sessionless tower is
    /// deleted outright; a tower with sessions is only accepted once every
    /// update is acked, and then its sessions are parked inactive while the
    /// tower itself stays loadable for later re-registration. Unknown towers
    /// are a silent no-op either way.
    pub fn remove_tower(
        &self,
        identity_key: &PublicKey,
        addr: Option<SocketAddr>,
    ) -> Result<(), ClientDbError> {
        self.store.update(|tx| {
            let pk_bytes = identity_key.serialize();
            let id_bytes = match tx.get(Namespace::TowerIndex, &pk_bytes)? {
                Some(bytes) => bytes,
                None => return Ok(()),
            };
            let tower_id = decode_tower_id(&id_bytes)?;

            if let Some(addr) = addr {
                let mut tower = get_tower_by_id(tx, tower_id)?;
                tower.remove_address(&addr);
                if tower.addresses.is_empty() {
                    return Err(ClientDbError::LastTowerAddr);
                }
                return put_tower(tx, &tower);
            }

            let sessions = super::sessions_for_tower(tx, tower_id)?;
            if sessions.is_empty() {
                tx.delete(Namespace::TowerIndex, &pk_bytes)?;
                tx.delete(Namespace::Towers, &tower_id.to_be_bytes())?;
                debug!("removed tower {}", tower_id);
                return Ok(());
            }

            for session in &sessions {
                if super::has_committed_updates(tx, &session.id)? {
                    return Err(ClientDbError::TowerUnackedUpdates);
                }
            }

            for mut session in sessions {
                session.status = SessionStatus::Inactive;
                super::put_session(tx, &session)?;
            }

            debug!("parked sessions of tower {} as inactive", tower_id);
            Ok(())
        })
    }

    /// Fetches a tower by identity key.
    pub fn load_tower(&self, identity_key: &PublicKey) -> Result<Tower, ClientDbError> {
        self.store.view(|tx| {
            let id_bytes = tx
                .get(Namespace::TowerIndex, &identity_key.serialize())?
                .ok_or(ClientDbError::TowerNotFound)?;
            get_tower_by_id(tx, decode_tower_id(&id_bytes)?)
        })
    }

    /// Fetches a tower by database-assigned id.
    pub fn load_tower_by_id(&self, tower_id: TowerId) -> Result<Tower, ClientDbError> {
        self.store.view(|tx| get_tower_by_id(tx, tower_id))
    }
}

fn get_tower_by_id(tx: &dyn StoreTx, tower_id: TowerId) -> Result<Tower, ClientDbError> {
    let raw = tx
        .get(Namespace::Towers, &tower_id.to_be_bytes())?
        .ok_or(ClientDbError::TowerNotFound)?;
    Ok(codec::decode(Namespace::Towers, &raw)?)
}

fn put_tower(tx: &mut dyn StoreTx, tower: &Tower) -> Result<(), ClientDbError> {
    let raw = codec::encode(Namespace::Towers, tower)?;
    tx.put(Namespace::Towers, &tower.id.to_be_bytes(), &raw)?;
    Ok(())
}

fn decode_tower_id(bytes: &[u8]) -> Result<TowerId, ClientDbError> {
    TowerId::from_be_slice(bytes)
        .ok_or_else(|| StoreError::corrupt(Namespace::TowerIndex, "Tower id is not 8 bytes").into())
}
