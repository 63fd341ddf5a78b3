//! Channel summary operations.

use std::collections::HashMap;

use crate::adapters::codec;
use crate::domain::channel::{ChannelId, ChannelSummary};
use crate::domain::errors::ClientDbError;
use crate::ports::store::{Namespace, StoreError, TxStore};

use super::ClientDb;

impl<S: TxStore> ClientDb<S> {
    /// Registers a channel for backup, remembering the script its justice
    /// transactions sweep to.
    ///
    /// First write wins: the sweep script stays fixed for the channel's
    /// lifetime so already-stored updates never point at a script that
    /// changed under them.
    pub fn register_channel(
        &self,
        chan_id: ChannelId,
        sweep_pk_script: Vec<u8>,
    ) -> Result<(), ClientDbError> {
        self.store.update(|tx| {
            if tx
                .get(Namespace::ChannelSummaries, chan_id.as_bytes())?
                .is_some()
            {
                return Err(ClientDbError::ChannelAlreadyRegistered);
            }

            let summary = ChannelSummary { sweep_pk_script };
            let raw = codec::encode(Namespace::ChannelSummaries, &summary)?;
            tx.put(Namespace::ChannelSummaries, chan_id.as_bytes(), &raw)?;
            Ok(())
        })
    }

    /// All registered channels and their sweep scripts.
    pub fn fetch_chan_summaries(
        &self,
    ) -> Result<HashMap<ChannelId, ChannelSummary>, ClientDbError> {
        self.store.view(|tx| {
            let mut summaries = HashMap::new();
            for (key, value) in tx.scan_prefix(Namespace::ChannelSummaries, &[])? {
                let chan_id = ChannelId::from_slice(&key).ok_or_else(|| {
                    StoreError::corrupt(Namespace::ChannelSummaries, "Channel id is not 32 bytes")
                })?;
                let summary: ChannelSummary = codec::decode(Namespace::ChannelSummaries, &value)?;
                summaries.insert(chan_id, summary);
            }
            Ok(summaries)
        })
    }
}
