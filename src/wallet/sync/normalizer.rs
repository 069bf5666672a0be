use crate::wallet::{Transaction, WalletSyncError};
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{debug, error};

/// The only fields the tracker needs out of an explorer record.
#[derive(Deserialize)]
struct RecordKeys {
	tx_index: i64,
	hash: String,
}

#[derive(Clone, Default)]
pub struct TransactionNormalizer;

impl TransactionNormalizer {
	pub fn new() -> Self {
		Self
	}

	/// Extract ordinal and hash from a raw record, keeping the record text as payload
	pub fn normalize(&self, raw: &RawValue) -> Result<Transaction, WalletSyncError> {
		let keys: RecordKeys = serde_json::from_str(raw.get())
			.map_err(|e| WalletSyncError::MalformedRecord(e.to_string()))?;

		if keys.hash.is_empty() {
			return Err(WalletSyncError::MalformedRecord(format!(
				"empty hash for tx_index {}",
				keys.tx_index
			)));
		}

		Ok(Transaction {
			index: keys.tx_index,
			hash: keys.hash,
			payload: raw.get().to_string(),
		})
	}

	/// Normalize every record of a page, failing on the first malformed one
	pub fn normalize_page(
		&self,
		address: &str,
		offset: u64,
		records: &[Box<RawValue>],
	) -> Result<Vec<Transaction>, WalletSyncError> {
		let mut normalized = Vec::with_capacity(records.len());

		for (position, raw) in records.iter().enumerate() {
			let tx = self.normalize(raw).map_err(|e| {
				let position = offset + position as u64;
				error!(
					"[NORMALIZE] Record {} of {} is malformed: {}",
					position, address, e
				);
				WalletSyncError::MalformedRecord(format!(
					"record {} of {}: {}",
					position,
					address,
					match e {
						WalletSyncError::MalformedRecord(reason) => reason,
						other => other.to_string(),
					}
				))
			})?;
			normalized.push(tx);
		}

		debug!(
			"Normalized {} records for {} at offset {}",
			normalized.len(),
			address,
			offset
		);
		Ok(normalized)
	}
}
