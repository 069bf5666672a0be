//! Explicit commit boundary for a sync pass.
//!
//! A [`WriteBatch`] holds one pooled connection with an open `BEGIN IMMEDIATE`
//! transaction. Balance and transaction writes can only be issued through it,
//! so every sync write happens inside a boundary. Dropping an uncommitted batch
//! rolls it back.

use tracing::{debug, warn};

use super::error::{expect_rows, DbError};
use super::pool::PooledConnection;
use super::queries::{AddressQueries, TransactionQueries};
use crate::wallet::{Snapshot, Transaction};

/// An open write transaction.
pub struct WriteBatch {
    conn: PooledConnection,
    open: bool,
}

impl WriteBatch {
    pub(crate) fn begin(conn: PooledConnection) -> Result<Self, DbError> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self { conn, open: true })
    }

    /// Overwrites the balance of a tracked address.
    ///
    /// Exactly one row must change. Zero means the address is not tracked,
    /// more than one means the table is corrupt; both fail the batch.
    pub fn update_balance(&self, address: &str, balance: i64) -> Result<(), DbError> {
        let changed = self.conn.store_balance(address, balance)?;
        expect_rows("balance update", 1, changed)
    }

    /// Inserts transactions that are not yet recorded for `address`.
    ///
    /// Already-recorded ordinals are left untouched. Returns the number of new rows.
    pub fn upsert_transactions(
        &self,
        address: &str,
        transactions: &[Transaction],
    ) -> Result<usize, DbError> {
        let mut inserted = 0;
        for tx in transactions {
            let changed = self.conn.insert_transaction(address, tx)?;
            if changed > 1 {
                return Err(DbError::RowCount {
                    operation: "transaction upsert",
                    expected: 1,
                    actual: changed,
                });
            }
            inserted += changed;
        }
        Ok(inserted)
    }

    /// Stages a snapshot's balance and transactions. Returns new transaction rows.
    pub fn stage_snapshot(&self, snapshot: &Snapshot) -> Result<usize, DbError> {
        self.update_balance(&snapshot.address, snapshot.balance)?;
        let inserted = self.upsert_transactions(&snapshot.address, &snapshot.transactions)?;
        debug!(
            "Staged {} with balance {} ({} new of {} transactions)",
            snapshot.address,
            snapshot.balance,
            inserted,
            snapshot.transactions.len()
        );
        Ok(inserted)
    }

    /// Applies every staged write.
    pub fn commit(mut self) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    /// Discards every staged write.
    pub fn rollback(mut self) -> Result<(), DbError> {
        self.open = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for WriteBatch {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back abandoned write batch: {}", e);
            }
        }
    }
}
