//! In-memory ledger used to drive the sync engine in tests.

use crate::explorer::{AddressPage, ExplorerError, LedgerSource};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;

struct FakeAccount {
    balance: i64,
    reported_total: u64,
    records: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeLedger {
    accounts: Mutex<HashMap<String, FakeAccount>>,
    calls: Mutex<Vec<(String, u64, u32, Instant)>>,
}

impl FakeLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `count` records, newest first, with ordinals `count - 1` down to `0`.
    pub(crate) fn records(count: usize) -> Vec<String> {
        (0..count)
            .rev()
            .map(|i| format!(r#"{{"hash":"hash-{i}","tx_index":{i},"fee":{}}}"#, i * 10))
            .collect()
    }

    pub(crate) fn with_account(self, address: &str, balance: i64, count: usize) -> Self {
        self.with_records(address, balance, count as u64, Self::records(count))
    }

    /// An account whose reported total disagrees with the records actually served.
    pub(crate) fn with_partial_account(
        self,
        address: &str,
        balance: i64,
        reported_total: u64,
        served: usize,
    ) -> Self {
        self.with_records(address, balance, reported_total, Self::records(served))
    }

    pub(crate) fn with_records(
        self,
        address: &str,
        balance: i64,
        reported_total: u64,
        records: Vec<String>,
    ) -> Self {
        self.set_account(address, balance, reported_total, records);
        self
    }

    /// Replace an account's upstream state between passes.
    pub(crate) fn set_account(
        &self,
        address: &str,
        balance: i64,
        reported_total: u64,
        records: Vec<String>,
    ) {
        self.accounts.lock().unwrap().insert(
            address.to_string(),
            FakeAccount {
                balance,
                reported_total,
                records,
            },
        );
    }

    /// `(offset, limit)` of every request made for `address`.
    pub(crate) fn calls(&self, address: &str) -> Vec<(u64, u32)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, ..)| a == address)
            .map(|(_, offset, limit, _)| (*offset, *limit))
            .collect()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|c| c.3).collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerSource for FakeLedger {
    async fn fetch_page(
        &self,
        address: &str,
        offset: u64,
        limit: u32,
    ) -> Result<AddressPage, ExplorerError> {
        self.calls
            .lock()
            .unwrap()
            .push((address.to_string(), offset, limit, Instant::now()));

        let accounts = self.accounts.lock().unwrap();
        let account = accounts.get(address).ok_or_else(|| ExplorerError::StatusError {
            address: address.to_string(),
            status: StatusCode::NOT_FOUND,
        })?;

        let start = (offset as usize).min(account.records.len());
        let end = (start + limit as usize).min(account.records.len());
        let txs = account.records[start..end]
            .iter()
            .map(|record| RawValue::from_string(record.clone()).unwrap())
            .collect();

        Ok(AddressPage {
            address: address.to_string(),
            total_count: account.reported_total,
            final_balance: account.balance,
            txs,
        })
    }
}
