//! Types for the explorer's paginated address feed

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::value::RawValue;

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// One page of an address's history as returned by the explorer.
///
/// Only the totals needed to drive pagination are decoded. Transaction records are
/// kept as raw JSON so the explorer's record schema never leaks past the normalizer.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressPage {
    /// The address this page belongs to, as echoed by the explorer.
    pub address: String,
    /// Total number of transactions the explorer reports for the address.
    #[serde(rename = "n_tx")]
    pub total_count: u64,
    /// Final balance of the address in the ledger's smallest unit.
    pub final_balance: i64,
    /// Raw transaction records on this page, newest first.
    #[serde(default)]
    pub txs: Vec<Box<RawValue>>,
}

impl AddressPage {
    /// Number of records carried by this page.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

/// Error types for explorer requests
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Explorer returned status {status} for address {address}")]
    StatusError { address: String, status: StatusCode },

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
