//! Storage error types.
//!
//! All failures of the persistence layer are consolidated into [`DbError`].
//! Callers in the sync engine treat every variant except
//! [`DuplicateAddress`](DbError::DuplicateAddress) and
//! [`NotFound`](DbError::NotFound) as a persistence failure that aborts the
//! current write batch.

use thiserror::Error;

/// Errors that can occur during storage operations.
///
/// # Error Categories
///
/// - **Infrastructure errors**: [`Sqlite`](DbError::Sqlite), [`Pool`](DbError::Pool),
///   [`Io`](DbError::Io)
/// - **Integrity errors**: [`RowCount`](DbError::RowCount), raised when a write
///   touched a different number of rows than it must
/// - **Caller errors**: [`DuplicateAddress`](DbError::DuplicateAddress),
///   [`NotFound`](DbError::NotFound)
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite database error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    ///
    /// Occurs when a connection cannot be obtained from the pool, including
    /// when another writer holds the only connection past the pool timeout.
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File system I/O error while creating the database file or its directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write changed an unexpected number of rows.
    ///
    /// This is a corruption signal: the batch it happened in must be rolled back.
    #[error("Unexpected row count in {operation}: expected {expected}, got {actual}")]
    RowCount {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The address is already tracked.
    #[error("Address already exists: {0}")]
    DuplicateAddress(String),

    /// The address is not tracked.
    #[error("Address not found: {0}")]
    NotFound(String),
}

/// Fails with [`DbError::RowCount`] unless exactly `expected` rows changed.
pub(crate) fn expect_rows(
    operation: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), DbError> {
    if actual != expected {
        return Err(DbError::RowCount {
            operation,
            expected,
            actual,
        });
    }
    Ok(())
}
