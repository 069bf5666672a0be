//! Persistence gateway backed by SQLite.
//!
//! [`WalletStore`] owns all durable state: the tracked address set, each
//! address's balance, and its recorded transactions. Address changes are
//! single atomic operations; sync results are written through a
//! [`WriteBatch`] so a whole pass commits or rolls back as one unit.
//!
//! All methods block on SQLite. Async callers run them on the blocking pool.

mod batch;
mod error;
mod pool;
mod queries;
mod schema;

pub use batch::WriteBatch;
pub use error::DbError;
pub use pool::{Database, PooledConnection, DEFAULT_BUSY_TIMEOUT};
pub use queries::{AddressQueries, TransactionQueries};

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::wallet::Snapshot;
use error::expect_rows;

/// Storage operations for tracked addresses and their synced data.
#[derive(Clone)]
pub struct WalletStore {
    db: Database,
}

impl WalletStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens (or creates) the store at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        pool_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self, DbError> {
        Ok(Self::new(Database::open(path, pool_size, busy_timeout)?))
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Starts tracking an address.
    ///
    /// Fails with [`DbError::DuplicateAddress`] if it is already tracked.
    pub fn add_address(&self, address: &str) -> Result<(), DbError> {
        self.db.transaction(|tx| {
            if tx.address_exists(address)? {
                return Err(DbError::DuplicateAddress(address.to_string()));
            }
            let changed = tx.insert_address(address)?;
            expect_rows("address insertion", 1, changed)
        })?;
        info!("Added address {}", address);
        Ok(())
    }

    /// Stops tracking an address and deletes its transactions in one transaction.
    ///
    /// Fails with [`DbError::NotFound`] if it is not tracked.
    pub fn remove_address(&self, address: &str) -> Result<(), DbError> {
        let removed_txs = self.db.transaction(|tx| {
            if !tx.address_exists(address)? {
                return Err(DbError::NotFound(address.to_string()));
            }
            let removed_txs = tx.delete_transactions(address)?;
            let changed = tx.delete_address(address)?;
            expect_rows("address removal", 1, changed)?;
            Ok(removed_txs)
        })?;
        info!(
            "Removed address {} and {} transactions",
            address, removed_txs
        );
        Ok(())
    }

    pub fn address_exists(&self, address: &str) -> Result<bool, DbError> {
        self.db.with_connection(|conn| conn.address_exists(address))
    }

    pub fn list_addresses(&self) -> Result<Vec<String>, DbError> {
        self.db.with_connection(|conn| conn.load_addresses())
    }

    pub fn balance(&self, address: &str) -> Result<i64, DbError> {
        self.db
            .with_connection(|conn| conn.load_balance(address))?
            .ok_or_else(|| DbError::NotFound(address.to_string()))
    }

    /// Stored payloads for a tracked address, highest ordinal first.
    pub fn transactions(&self, address: &str) -> Result<Vec<String>, DbError> {
        self.db.with_connection(|conn| {
            if !conn.address_exists(address)? {
                return Err(DbError::NotFound(address.to_string()));
            }
            conn.load_payloads(address)
        })
    }

    pub fn transaction_count(&self, address: &str) -> Result<u64, DbError> {
        self.db.with_connection(|conn| conn.count_transactions(address))
    }

    /// Opens a commit boundary.
    pub fn begin(&self) -> Result<WriteBatch, DbError> {
        WriteBatch::begin(self.db.connection()?)
    }

    /// Writes every snapshot inside one boundary.
    ///
    /// The first failing write rolls back everything staged before it and is
    /// returned. Returns the number of new transaction rows on success.
    pub fn commit_snapshots(&self, snapshots: &[Snapshot]) -> Result<usize, DbError> {
        let batch = self.begin()?;

        let mut inserted = 0;
        for snapshot in snapshots {
            match batch.stage_snapshot(snapshot) {
                Ok(count) => inserted += count,
                Err(e) => {
                    warn!(
                        "Rolling back sync batch: write for {} failed: {}",
                        snapshot.address, e
                    );
                    batch.rollback()?;
                    return Err(e);
                }
            }
        }

        batch.commit()?;
        info!(
            "Committed {} snapshots ({} new transactions)",
            snapshots.len(),
            inserted
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Transaction;

    fn snapshot(address: &str, balance: i64, indices: &[i64]) -> Snapshot {
        Snapshot {
            address: address.to_string(),
            balance,
            transaction_count: indices.len() as u64,
            transactions: indices
                .iter()
                .map(|i| Transaction {
                    index: *i,
                    hash: format!("h{}", i),
                    payload: format!("{{\"tx_index\":{}}}", i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_duplicate_add_keeps_one_row() {
        let store = WalletStore::open_in_memory().unwrap();

        store.add_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap();
        let err = store.add_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap_err();

        assert!(matches!(err, DbError::DuplicateAddress(_)));
        assert_eq!(store.list_addresses().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_missing_address() {
        let store = WalletStore::open_in_memory().unwrap();
        assert!(matches!(
            store.remove_address("ghost"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_deletes_transactions() {
        let store = WalletStore::open_in_memory().unwrap();
        store.add_address("addr1").unwrap();
        store.commit_snapshots(&[snapshot("addr1", 5, &[1, 2])]).unwrap();
        assert_eq!(store.transaction_count("addr1").unwrap(), 2);

        store.remove_address("addr1").unwrap();

        assert!(!store.address_exists("addr1").unwrap());
        assert_eq!(store.transaction_count("addr1").unwrap(), 0);
        assert!(matches!(store.balance("addr1"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_update_balance_requires_tracked_address() {
        let store = WalletStore::open_in_memory().unwrap();
        let batch = store.begin().unwrap();

        let err = batch.update_balance("ghost", 100).unwrap_err();
        assert!(matches!(
            err,
            DbError::RowCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_write_rolls_back_earlier_writes() {
        let store = WalletStore::open_in_memory().unwrap();
        store.add_address("addrA").unwrap();

        let batch = store.begin().unwrap();
        batch.update_balance("addrA", 100).unwrap();
        assert!(batch.update_balance("addrB", 200).is_err());
        batch.rollback().unwrap();

        assert_eq!(store.balance("addrA").unwrap(), 0);
    }

    #[test]
    fn test_dropped_batch_rolls_back() {
        let store = WalletStore::open_in_memory().unwrap();
        store.add_address("addrA").unwrap();

        {
            let batch = store.begin().unwrap();
            batch.update_balance("addrA", 100).unwrap();
        }

        assert_eq!(store.balance("addrA").unwrap(), 0);
    }

    #[test]
    fn test_commit_snapshots_is_all_or_nothing() {
        let store = WalletStore::open_in_memory().unwrap();
        store.add_address("addrA").unwrap();

        let err = store
            .commit_snapshots(&[snapshot("addrA", 100, &[1, 2, 3]), snapshot("addrB", 7, &[1])])
            .unwrap_err();

        assert!(matches!(err, DbError::RowCount { .. }));
        assert_eq!(store.balance("addrA").unwrap(), 0);
        assert_eq!(store.transaction_count("addrA").unwrap(), 0);
    }

    #[test]
    fn test_reapplying_snapshot_inserts_nothing() {
        let store = WalletStore::open_in_memory().unwrap();
        store.add_address("addrA").unwrap();

        let snap = snapshot("addrA", 100, &[1, 2, 3]);
        assert_eq!(store.commit_snapshots(&[snap.clone()]).unwrap(), 3);
        assert_eq!(store.commit_snapshots(&[snap]).unwrap(), 0);
        assert_eq!(store.transaction_count("addrA").unwrap(), 3);
    }

    #[test]
    fn test_recorded_payload_is_final() {
        let store = WalletStore::open_in_memory().unwrap();
        store.add_address("addrA").unwrap();
        store.commit_snapshots(&[snapshot("addrA", 1, &[9])]).unwrap();

        let mut changed = snapshot("addrA", 2, &[9]);
        changed.transactions[0].payload = r#"{"tx_index":9,"rewritten":true}"#.to_string();
        assert_eq!(store.commit_snapshots(&[changed]).unwrap(), 0);

        assert_eq!(store.balance("addrA").unwrap(), 2);
        assert_eq!(store.transactions("addrA").unwrap(), vec![r#"{"tx_index":9}"#]);
    }

    #[test]
    fn test_file_backed_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallet.db");

        {
            let store = WalletStore::open(&path, 2, DEFAULT_BUSY_TIMEOUT).unwrap();
            store.add_address("addrA").unwrap();
            store.commit_snapshots(&[snapshot("addrA", 55, &[4, 8])]).unwrap();
        }

        let store = WalletStore::open(&path, 2, DEFAULT_BUSY_TIMEOUT).unwrap();
        assert_eq!(store.list_addresses().unwrap(), vec!["addrA"]);
        assert_eq!(store.balance("addrA").unwrap(), 55);
        assert_eq!(
            store.transactions("addrA").unwrap(),
            vec![r#"{"tx_index":8}"#, r#"{"tx_index":4}"#]
        );
    }
}
