//! Typed query traits over [`rusqlite::Connection`].
//!
//! Each method is a single statement and reports the rows it changed. Row-count
//! policy lives with the callers in [`WalletStore`](super::WalletStore) and
//! [`WriteBatch`](super::WriteBatch), which know what a given write must touch.

use rusqlite::{params, Connection, OptionalExtension};

use super::error::DbError;
use crate::wallet::Transaction;

/// Queries over the tracked address set.
pub trait AddressQueries {
    /// Checks if an address is tracked.
    fn address_exists(&self, address: &str) -> Result<bool, DbError>;

    /// Inserts a new address with a zero balance. Returns rows changed.
    fn insert_address(&self, address: &str) -> Result<usize, DbError>;

    /// Deletes an address row. Returns rows changed.
    fn delete_address(&self, address: &str) -> Result<usize, DbError>;

    /// Loads all tracked addresses in lexical order.
    fn load_addresses(&self) -> Result<Vec<String>, DbError>;

    /// Loads an address's balance, or `None` if the address is not tracked.
    fn load_balance(&self, address: &str) -> Result<Option<i64>, DbError>;

    /// Overwrites an address's balance. Returns rows changed.
    fn store_balance(&self, address: &str, balance: i64) -> Result<usize, DbError>;
}

/// Queries over stored transactions.
pub trait TransactionQueries {
    /// Inserts a transaction unless `(address, tx_index)` already exists.
    ///
    /// Returns 1 for a new row and 0 when the ordinal was already recorded;
    /// the stored payload is never overwritten.
    fn insert_transaction(&self, address: &str, tx: &Transaction) -> Result<usize, DbError>;

    /// Deletes every transaction of an address. Returns rows changed.
    fn delete_transactions(&self, address: &str) -> Result<usize, DbError>;

    /// Loads the stored payloads of an address, highest ordinal first.
    fn load_payloads(&self, address: &str) -> Result<Vec<String>, DbError>;

    /// Counts the stored transactions of an address.
    fn count_transactions(&self, address: &str) -> Result<u64, DbError>;
}

impl AddressQueries for Connection {
    fn address_exists(&self, address: &str) -> Result<bool, DbError> {
        let exists: bool = self.query_row(
            "SELECT EXISTS(SELECT 1 FROM addresses WHERE address = ?1)",
            params![address],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_address(&self, address: &str) -> Result<usize, DbError> {
        let changed = self.execute(
            "INSERT INTO addresses (address) VALUES (?1)",
            params![address],
        )?;
        Ok(changed)
    }

    fn delete_address(&self, address: &str) -> Result<usize, DbError> {
        let changed = self.execute(
            "DELETE FROM addresses WHERE address = ?1",
            params![address],
        )?;
        Ok(changed)
    }

    fn load_addresses(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.prepare("SELECT address FROM addresses ORDER BY address")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DbError::from)
    }

    fn load_balance(&self, address: &str) -> Result<Option<i64>, DbError> {
        let balance = self
            .query_row(
                "SELECT balance FROM addresses WHERE address = ?1",
                params![address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }

    fn store_balance(&self, address: &str, balance: i64) -> Result<usize, DbError> {
        let changed = self.execute(
            "UPDATE addresses SET balance = ?1 WHERE address = ?2",
            params![balance, address],
        )?;
        Ok(changed)
    }
}

impl TransactionQueries for Connection {
    fn insert_transaction(&self, address: &str, tx: &Transaction) -> Result<usize, DbError> {
        let changed = self.execute(
            "INSERT OR IGNORE INTO transactions (address, tx_index, hash, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![address, tx.index, tx.hash, tx.payload],
        )?;
        Ok(changed)
    }

    fn delete_transactions(&self, address: &str) -> Result<usize, DbError> {
        let changed = self.execute(
            "DELETE FROM transactions WHERE address = ?1",
            params![address],
        )?;
        Ok(changed)
    }

    fn load_payloads(&self, address: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.prepare(
            "SELECT payload FROM transactions WHERE address = ?1 ORDER BY tx_index DESC",
        )?;
        let rows = stmt.query_map(params![address], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DbError::from)
    }

    fn count_transactions(&self, address: &str) -> Result<u64, DbError> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM transactions WHERE address = ?1",
            params![address],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
