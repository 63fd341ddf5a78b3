//! In-memory store backend.
//!
//! One ordered map per namespace behind a read-write lock. Transactions stage
//! their writes in a per-namespace overlay and the overlay is applied to the
//! base maps only when the closure succeeds, so a validation failure midway
//! through a multi-record operation leaves the base untouched. Used as the
//! non-persistent backend and throughout the test suites.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::ports::store::{Namespace, StoreError, StoreTx, TxStore};

const NS_COUNT: usize = Namespace::ALL.len();

type Records = BTreeMap<Vec<u8>, Vec<u8>>;
type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Non-persistent [`TxStore`] backend.
#[derive(Default)]
pub struct MemoryStore {
    shelves: RwLock<[Records; NS_COUNT]>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transaction over the base maps. `None` in the overlay marks a staged
/// deletion; an empty overlay makes this a plain read-only view.
struct MemoryTx<'a> {
    base: &'a [Records; NS_COUNT],
    staged: [Overlay; NS_COUNT],
}

impl<'a> MemoryTx<'a> {
    fn new(base: &'a [Records; NS_COUNT]) -> Self {
        MemoryTx {
            base,
            staged: Default::default(),
        }
    }
}

impl StoreTx for MemoryTx<'_> {
    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(entry) = self.staged[ns.idx()].get(key) {
            return Ok(entry.clone());
        }
        Ok(self.base[ns.idx()].get(key).cloned())
    }

    fn put(&mut self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.staged[ns.idx()].insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, ns: Namespace, key: &[u8]) -> Result<(), StoreError> {
        self.staged[ns.idx()].insert(key.to_vec(), None);
        Ok(())
    }

    fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut merged: Records = self.base[ns.idx()]
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, entry) in self.staged[ns.idx()]
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match entry {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }
}

impl TxStore for MemoryStore {
    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
    {
        // Write lock held for the whole closure: updates are serialized. A
        // panic unwinds without applying the overlay and without poisoning.
        let mut shelves = self.shelves.write();
        let mut tx = MemoryTx::new(&shelves);

        let value = f(&mut tx)?;

        let staged = tx.staged;
        let base = &mut *shelves;
        for (idx, overlay) in staged.into_iter().enumerate() {
            for (key, entry) in overlay {
                match entry {
                    Some(val) => {
                        base[idx].insert(key, val);
                    }
                    None => {
                        base[idx].remove(&key);
                    }
                }
            }
        }

        Ok(value)
    }

    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreTx) -> Result<T, E>,
    {
        let shelves = self.shelves.read();
        let tx = MemoryTx::new(&shelves);
        f(&tx)
    }
}
