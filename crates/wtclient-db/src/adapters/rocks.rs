//! RocksDB store backend.
//!
//! Persistent implementation of [`TxStore`] over a pessimistic
//! `TransactionDB`, one column family per [`Namespace`]. Read-write
//! transactions run behind an exclusive write gate, so committed updates form
//! a serial history without deadlock or retry handling; read-only views run
//! against committed state without taking the gate.

use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, Transaction,
    TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use tracing::info;

use crate::ports::store::{Namespace, StoreError, StoreTx, TxStore};

/// RocksDB tuning knobs.
#[derive(Debug, Clone)]
pub struct RocksConfig {
    /// Path to the database directory.
    pub path: String,
    /// Block cache size in bytes.
    pub block_cache_size: usize,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of write buffers.
    pub max_write_buffer_number: i32,
    /// fsync on commit. Disabled only for tests.
    pub sync_writes: bool,
}

impl Default for RocksConfig {
    fn default() -> Self {
        Self {
            path: "./data/wtclient".to_string(),
            block_cache_size: 32 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: true,
        }
    }
}

impl RocksConfig {
    /// Config for tests: small buffers, no fsync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// Persistent [`TxStore`] backend.
pub struct RocksStore {
    db: TransactionDB,
    write_gate: Mutex<()>,
    config: RocksConfig,
}

impl RocksStore {
    /// Opens or creates the database, creating every namespace column family.
    pub fn open(config: RocksConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Namespace::ALL
            .iter()
            .map(|ns| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(ns.name(), cf_opts)
            })
            .collect();

        let txn_db_opts = TransactionDBOptions::default();
        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &txn_db_opts,
            &config.path,
            cf_descriptors,
        )
        .map_err(|e| StoreError::backend(format!("failed to open rocksdb: {}", e)))?;

        info!("opened watchtower client store at {}", config.path);

        Ok(Self {
            db,
            write_gate: Mutex::new(()),
            config,
        })
    }

    fn begin(&self) -> Transaction<'_, TransactionDB> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .transaction_opt(&write_opts, &TransactionOptions::default())
    }
}

struct RocksTx<'a> {
    db: &'a TransactionDB,
    txn: &'a Transaction<'a, TransactionDB>,
}

impl RocksTx<'_> {
    fn cf(&self, ns: Namespace) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(ns.name())
            .ok_or_else(|| StoreError::backend(format!("missing column family {}", ns.name())))
    }
}

impl StoreTx for RocksTx<'_> {
    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf(ns)?;
        self.txn
            .get_cf(cf, key)
            .map_err(|e| StoreError::io(format!("rocksdb get failed: {}", e)))
    }

    fn put(&mut self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(ns)?;
        self.txn
            .put_cf(cf, key, value)
            .map_err(|e| StoreError::io(format!("rocksdb put failed: {}", e)))
    }

    fn delete(&mut self, ns: Namespace, key: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(ns)?;
        self.txn
            .delete_cf(cf, key)
            .map_err(|e| StoreError::io(format!("rocksdb delete failed: {}", e)))
    }

    fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let cf = self.cf(ns)?;
        let mut results = Vec::new();

        // The transaction iterator merges staged writes with committed state.
        let iter = self
            .txn
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) =
                item.map_err(|e| StoreError::io(format!("rocksdb scan failed: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }
}

impl TxStore for RocksStore {
    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
    {
        let _gate = self.write_gate.lock();
        let txn = self.begin();

        let result = {
            let mut tx = RocksTx { db: &self.db, txn: &txn };
            f(&mut tx)
        };

        match result {
            Ok(value) => {
                txn.commit()
                    .map_err(|e| StoreError::io(format!("rocksdb commit failed: {}", e)))?;
                Ok(value)
            }
            // Dropping an uncommitted transaction rolls it back, which also
            // covers unwinding out of the closure.
            Err(e) => Err(e),
        }
    }

    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn StoreTx) -> Result<T, E>,
    {
        // Never committed; reads observe the last committed state.
        let txn = self.db.transaction();
        let tx = RocksTx { db: &self.db, txn: &txn };
        f(&tx)
    }
}
