use crate::explorer::ExplorerError;
use crate::store::DbError;

use serde::Serialize;
use serde_json::value::RawValue;

/// A transaction as stored locally.
///
/// `index` is the ledger-assigned ordinal and the dedup key within an address.
/// `payload` is the explorer's original record, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub index: i64,
    pub hash: String,
    pub payload: String,
}

/// Consolidated result of syncing one address, staged for a single commit.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub address: String,
    pub balance: i64,
    /// Transaction count reported by the explorer, which may exceed `transactions.len()`
    /// when the explorer's count is ahead of the pages it served.
    pub transaction_count: u64,
    pub transactions: Vec<Transaction>,
}

/// Per-address view returned to callers: balance plus the stored transaction list.
#[derive(Debug, Serialize)]
pub struct AddressSummary {
    pub address: String,
    pub balance: i64,
    pub transactions: Box<RawValue>,
}

/// Error types for wallet sync and storage operations
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
    #[error("Transport error: {0}")]
    TransportError(#[from] ExplorerError),

    #[error("Malformed transaction record: {0}")]
    MalformedRecord(String),

    #[error("Persistence error: {0}")]
    PersistenceError(DbError),

    #[error("Address already tracked: {0}")]
    DuplicateAddress(String),

    #[error("Address not found: {0}")]
    NotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Stored payload is not valid JSON: {0}")]
    PayloadError(#[from] serde_json::Error),

    #[error("Sync pass cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    TaskError(String),
}

impl From<DbError> for WalletSyncError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::DuplicateAddress(address) => WalletSyncError::DuplicateAddress(address),
            DbError::NotFound(address) => WalletSyncError::NotFound(address),
            other => WalletSyncError::PersistenceError(other),
        }
    }
}
