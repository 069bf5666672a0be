//! Wallet service.
//!
//! [`WalletService`] is the upward entry point of the crate. It validates and
//! applies address changes, reads stored balances and transactions, and starts
//! sync passes. A pass fetches every tracked address through the orchestrator
//! and then commits all resulting snapshots in one write batch.
//!
//! The service is cheap to clone. Clones share the store, the orchestrator and
//! the single-flight runner, so concurrent callers of [`WalletService::sync_all`]
//! always observe the same pass.

use crate::config::AppConfig;
use crate::explorer::ExplorerClient;
use crate::store::{DbError, WalletStore};
use crate::wallet::sync::runner::cancelled;
use crate::wallet::sync::{AddressSyncOrchestrator, SyncHandle, SyncRunner, SyncSummary};
use crate::wallet::{AddressSummary, WalletSyncError};

use chrono::Utc;
use serde_json::value::RawValue;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Longest address accepted for tracking.
pub const MAX_ADDRESS_LEN: usize = 42;

struct ServiceInner {
    store: WalletStore,
    orchestrator: AddressSyncOrchestrator,
    runner: SyncRunner,
}

/// Tracks addresses and keeps their stored history in sync with the explorer.
#[derive(Clone)]
pub struct WalletService {
    inner: Arc<ServiceInner>,
}

impl WalletService {
    pub fn new(store: WalletStore, orchestrator: AddressSyncOrchestrator) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                store,
                orchestrator,
                runner: SyncRunner::new(),
            }),
        }
    }

    /// Build the explorer client, open the store and wire them together.
    pub fn from_config(config: &AppConfig) -> Result<Self, WalletSyncError> {
        let client = ExplorerClient::new(
            &config.explorer.base_url,
            config.explorer.request_timeout(),
        )?;
        let store = WalletStore::open(
            &config.storage.database_path,
            config.storage.pool_size,
            config.storage.busy_timeout(),
        )?;
        let orchestrator = AddressSyncOrchestrator::new(Arc::new(client), config.sync_config());
        Ok(Self::new(store, orchestrator))
    }

    /// Start tracking `address`.
    ///
    /// Returns `true` if the address was already tracked, in which case nothing changes.
    pub async fn add_address(&self, address: &str) -> Result<bool, WalletSyncError> {
        validate_address(address)?;

        let store = self.inner.store.clone();
        let owned = address.to_string();
        match run_blocking(move || store.add_address(&owned)).await {
            Ok(()) => Ok(false),
            Err(WalletSyncError::DuplicateAddress(_)) => {
                info!("Address {} is already tracked", address);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop tracking `address` and delete its stored transactions.
    ///
    /// Returns `false` if the address was not tracked.
    pub async fn remove_address(&self, address: &str) -> Result<bool, WalletSyncError> {
        let store = self.inner.store.clone();
        let owned = address.to_string();
        match run_blocking(move || store.remove_address(&owned)).await {
            Ok(()) => Ok(true),
            Err(WalletSyncError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn list_addresses(&self) -> Result<Vec<String>, WalletSyncError> {
        let store = self.inner.store.clone();
        run_blocking(move || store.list_addresses()).await
    }

    pub async fn balance(&self, address: &str) -> Result<i64, WalletSyncError> {
        let store = self.inner.store.clone();
        let owned = address.to_string();
        run_blocking(move || store.balance(&owned)).await
    }

    /// Stored transactions of `address` as one JSON array, newest first.
    pub async fn transactions(&self, address: &str) -> Result<Vec<u8>, WalletSyncError> {
        let store = self.inner.store.clone();
        let owned = address.to_string();
        let payloads = run_blocking(move || store.transactions(&owned)).await?;
        let records = raw_records(payloads)?;
        Ok(serde_json::to_vec(&records)?)
    }

    /// Balance and transactions of every tracked address.
    pub async fn wallet_data(&self) -> Result<Vec<AddressSummary>, WalletSyncError> {
        let store = self.inner.store.clone();
        let rows = run_blocking(move || {
            let mut rows = Vec::new();
            for address in store.list_addresses()? {
                // An address removed since the listing is simply left out.
                let balance = match store.balance(&address) {
                    Ok(balance) => balance,
                    Err(DbError::NotFound(_)) => continue,
                    Err(e) => return Err(e),
                };
                let payloads = match store.transactions(&address) {
                    Ok(payloads) => payloads,
                    Err(DbError::NotFound(_)) => continue,
                    Err(e) => return Err(e),
                };
                rows.push((address, balance, payloads));
            }
            Ok(rows)
        })
        .await?;

        rows.into_iter()
            .map(|(address, balance, payloads)| {
                let transactions = serde_json::value::to_raw_value(&raw_records(payloads)?)?;
                Ok(AddressSummary {
                    address,
                    balance,
                    transactions,
                })
            })
            .collect()
    }

    /// Start a sync pass over every tracked address, or join the one already running.
    pub fn sync_all(&self) -> SyncHandle {
        let inner = self.inner.clone();
        self.inner
            .runner
            .start(move |cancel| run_pass(inner, cancel))
    }

    /// Handle of the most recent sync pass, if any was started.
    pub fn current_sync(&self) -> Option<SyncHandle> {
        self.inner.runner.current()
    }
}

fn validate_address(address: &str) -> Result<(), WalletSyncError> {
    let len = address.chars().count();
    if len == 0 || len > MAX_ADDRESS_LEN {
        return Err(WalletSyncError::InvalidAddress(format!(
            "{:?} must be between 1 and {} characters",
            address, MAX_ADDRESS_LEN
        )));
    }
    Ok(())
}

fn raw_records(payloads: Vec<String>) -> Result<Vec<Box<RawValue>>, WalletSyncError> {
    payloads
        .into_iter()
        .map(|payload| RawValue::from_string(payload).map_err(WalletSyncError::from))
        .collect()
}

fn is_cancelled(signal: &watch::Receiver<bool>) -> bool {
    *signal.borrow()
}

async fn run_blocking<T, F>(f: F) -> Result<T, WalletSyncError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WalletSyncError::TaskError(e.to_string()))?
        .map_err(WalletSyncError::from)
}

/// One sync pass: fetch every address, then commit all snapshots together.
///
/// Cancellation is honored until the commit starts. A cancelled pass writes nothing.
async fn run_pass(
    inner: Arc<ServiceInner>,
    mut cancel: watch::Receiver<bool>,
) -> Result<SyncSummary, WalletSyncError> {
    if is_cancelled(&cancel) {
        return Err(WalletSyncError::Cancelled);
    }

    let store = inner.store.clone();
    let addresses = run_blocking(move || store.list_addresses()).await?;
    if addresses.is_empty() {
        info!("No addresses tracked, nothing to sync");
    }

    let report = tokio::select! {
        biased;
        _ = cancelled(&mut cancel) => return Err(WalletSyncError::Cancelled),
        report = inner.orchestrator.sync_addresses(&addresses) => report,
    };

    if is_cancelled(&cancel) {
        return Err(WalletSyncError::Cancelled);
    }

    for failure in &report.failures {
        warn!(
            "Address {} skipped this pass: {}",
            failure.address, failure.error
        );
    }

    let addresses_synced = report.snapshots.len();
    let transactions_inserted = if report.snapshots.is_empty() {
        0
    } else {
        let store = inner.store.clone();
        let snapshots = report.snapshots;
        run_blocking(move || store.commit_snapshots(&snapshots)).await?
    };

    Ok(SyncSummary {
        addresses_synced,
        addresses_failed: report.failures.len(),
        transactions_inserted,
        finished_at: Utc::now(),
    })
}
