//! Address sync orchestrator.
//!
//! This module defines the `AddressSyncOrchestrator`, which turns an address's
//! paginated explorer history into one consolidated [`Snapshot`]. It drives the
//! [`LedgerSource`] page by page, normalizes every record, merges duplicate
//! ordinals, and paces every outbound call through a [`RateLimiter`].
//!
//! The orchestrator is responsible for:
//! - Stopping pagination on a short page or once the reported count is reached
//! - Failing the whole address on any fetch or normalization error, so a
//!   half-synced address never reaches storage
//! - Running many addresses sequentially, isolating per-address failures
//!
//! It never writes to storage. Committing the snapshots is the caller's job.

use crate::explorer::{LedgerSource, DEFAULT_PAGE_SIZE};
use crate::wallet::sync::{
    normalizer::TransactionNormalizer,
    progress_tracker::{SyncProgressTracker, SyncStats},
    rate_limiter::RateLimiter,
};
use crate::wallet::{Snapshot, WalletSyncError};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for sync passes
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records requested per explorer page
    pub page_size: u32,
    /// Minimum spacing between explorer requests
    pub page_interval: Duration,
    /// Pause between the end of one address and the start of the next
    pub address_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_interval: Duration::from_secs(15),
            address_interval: Duration::from_secs(30),
        }
    }
}

/// An address whose sync failed during a multi-address pass
#[derive(Debug)]
pub struct AddressFailure {
    pub address: String,
    pub error: WalletSyncError,
}

/// Outcome of syncing a set of addresses.
///
/// `snapshots` holds only addresses that synced completely; failed addresses
/// appear in `failures` and nowhere else.
#[derive(Debug)]
pub struct SyncReport {
    pub snapshots: Vec<Snapshot>,
    pub failures: Vec<AddressFailure>,
    pub stats: SyncStats,
}

/// Drives the explorer across pages and addresses.
pub struct AddressSyncOrchestrator {
    source: Arc<dyn LedgerSource>,
    normalizer: TransactionNormalizer,
    page_limiter: RateLimiter,
    address_limiter: RateLimiter,
    config: SyncConfig,
}

impl AddressSyncOrchestrator {
    pub fn new(source: Arc<dyn LedgerSource>, config: SyncConfig) -> Self {
        Self {
            source,
            normalizer: TransactionNormalizer::new(),
            page_limiter: RateLimiter::pacing(config.page_interval),
            address_limiter: RateLimiter::pacing(config.address_interval),
            config,
        }
    }

    /// Sync one address into a snapshot.
    pub async fn sync_address(&self, address: &str) -> Result<Snapshot, WalletSyncError> {
        let mut tracker = SyncProgressTracker::new();
        self.sync_address_tracked(address, &mut tracker).await
    }

    /// Sync every address in order, one at a time.
    ///
    /// A failing address is logged and reported, and the remaining addresses
    /// still sync.
    pub async fn sync_addresses(&self, addresses: &[String]) -> SyncReport {
        let mut tracker = SyncProgressTracker::new();
        let mut snapshots = Vec::with_capacity(addresses.len());
        let mut failures = Vec::new();

        info!("Starting sync of {} addresses", addresses.len());

        for address in addresses {
            self.address_limiter.acquire().await;

            match self.sync_address_tracked(address, &mut tracker).await {
                Ok(snapshot) => {
                    tracker.record_address_synced();
                    snapshots.push(snapshot);
                }
                Err(e) => {
                    error!("Failed to sync address {}: {}", address, e);
                    tracker.record_address_failed();
                    failures.push(AddressFailure {
                        address: address.clone(),
                        error: e,
                    });
                }
            }
            // The next address waits a full interval after this one's last request.
            self.address_limiter.restart();
            tracker.log_progress(false);
        }

        tracker.log_progress(true);
        let stats = tracker.get_stats();
        info!("Sync finished: {}", stats.summary());

        SyncReport {
            snapshots,
            failures,
            stats,
        }
    }

    async fn sync_address_tracked(
        &self,
        address: &str,
        tracker: &mut SyncProgressTracker,
    ) -> Result<Snapshot, WalletSyncError> {
        let page_size = self.config.page_size;
        let mut offset = 0u64;
        let mut totals: Option<(i64, u64)> = None;
        let mut transactions = Vec::new();
        let mut seen = HashSet::new();

        loop {
            self.page_limiter.acquire().await;

            let page = self.source.fetch_page(address, offset, page_size).await?;

            // Balance and count come from the first page only; later pages may
            // have moved on but the pass reports one consistent view.
            let (_, total_count) = *totals.get_or_insert_with(|| {
                if page.address != address {
                    warn!(
                        "Explorer answered {} for requested address {}",
                        page.address, address
                    );
                }
                (page.final_balance, page.total_count)
            });

            let normalized = self.normalizer.normalize_page(address, offset, &page.txs)?;
            let mut merged = 0;
            for tx in normalized {
                if seen.insert(tx.index) {
                    transactions.push(tx);
                } else {
                    debug!("Merging duplicate tx_index {} for {}", tx.index, address);
                    merged += 1;
                }
            }
            tracker.record_page(page.len() - merged, merged);

            offset += u64::from(page_size);
            if page.len() < page_size as usize || offset >= total_count {
                break;
            }
        }

        let (balance, transaction_count) = totals.unwrap_or_default();
        info!(
            "Synced {}: balance {}, {} transactions collected ({} reported)",
            address,
            balance,
            transactions.len(),
            transaction_count
        );

        Ok(Snapshot {
            address: address.to_string(),
            balance,
            transaction_count,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::sync::testing::FakeLedger;
    use tokio::time::Instant;

    fn orchestrator(ledger: Arc<FakeLedger>, config: SyncConfig) -> AddressSyncOrchestrator {
        AddressSyncOrchestrator::new(ledger, config)
    }

    fn fast_config() -> SyncConfig {
        SyncConfig {
            page_size: 50,
            page_interval: Duration::ZERO,
            address_interval: Duration::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_exactly_three_pages_for_120_transactions() {
        let ledger = Arc::new(FakeLedger::new().with_account("addr1", 1_000, 120));
        let orchestrator = orchestrator(ledger.clone(), SyncConfig::default());

        let snapshot = orchestrator.sync_address("addr1").await.unwrap();

        assert_eq!(ledger.calls("addr1"), vec![(0, 50), (50, 50), (100, 50)]);
        assert_eq!(snapshot.transactions.len(), 120);
        assert_eq!(snapshot.transaction_count, 120);
        assert_eq!(snapshot.balance, 1_000);
        assert_eq!(snapshot.transactions[0].index, 119);
        assert_eq!(snapshot.transactions[119].index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_pages_not_before_first() {
        let ledger = Arc::new(FakeLedger::new().with_account("addr1", 0, 120));
        let orchestrator = orchestrator(ledger.clone(), SyncConfig::default());
        let start = Instant::now();

        orchestrator.sync_address("addr1").await.unwrap();

        let times = ledger.call_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0].duration_since(start), Duration::ZERO);
        assert!(times[1].duration_since(times[0]) >= Duration::from_secs(15));
        assert!(times[2].duration_since(times[1]) >= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let ledger = Arc::new(FakeLedger::new().with_partial_account("addr1", 10, 500, 70));
        let orchestrator = orchestrator(ledger.clone(), fast_config());

        let snapshot = orchestrator.sync_address("addr1").await.unwrap();

        assert_eq!(ledger.calls("addr1"), vec![(0, 50), (50, 50)]);
        assert_eq!(snapshot.transactions.len(), 70);
        assert_eq!(snapshot.transaction_count, 500);
    }

    #[tokio::test]
    async fn test_reported_count_bounds_pagination() {
        // Explorer count lags behind the records it serves.
        let ledger = Arc::new(FakeLedger::new().with_partial_account("addr1", 10, 40, 200));
        let orchestrator = orchestrator(ledger.clone(), fast_config());

        let snapshot = orchestrator.sync_address("addr1").await.unwrap();

        assert_eq!(ledger.calls("addr1"), vec![(0, 50)]);
        assert_eq!(snapshot.transactions.len(), 50);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let ledger = Arc::new(FakeLedger::new().with_account("addr1", 0, 0));
        let orchestrator = orchestrator(ledger.clone(), fast_config());

        let snapshot = orchestrator.sync_address("addr1").await.unwrap();

        assert_eq!(ledger.calls("addr1").len(), 1);
        assert!(snapshot.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_fails_address() {
        let mut records = FakeLedger::records(60);
        records[55] = r#"{"hash":"no-ordinal"}"#.to_string();
        let ledger = Arc::new(FakeLedger::new().with_records("addr1", 5, 60, records));
        let orchestrator = orchestrator(ledger, fast_config());

        let err = orchestrator.sync_address("addr1").await.unwrap_err();
        assert!(matches!(err, WalletSyncError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_transport_error_fails_address() {
        let ledger = Arc::new(FakeLedger::new());
        let orchestrator = orchestrator(ledger, fast_config());

        let err = orchestrator.sync_address("unknown").await.unwrap_err();
        assert!(matches!(err, WalletSyncError::TransportError(_)));
    }

    #[tokio::test]
    async fn test_duplicate_ordinals_are_merged() {
        // A transaction shifts across a page boundary between two requests.
        let mut records = FakeLedger::records(60);
        records[50] = records[49].clone();
        let ledger = Arc::new(FakeLedger::new().with_records("addr1", 5, 60, records));
        let orchestrator = orchestrator(ledger, fast_config());

        let snapshot = orchestrator.sync_address("addr1").await.unwrap();

        assert_eq!(snapshot.transactions.len(), 59);
        let unique: HashSet<i64> = snapshot.transactions.iter().map(|tx| tx.index).collect();
        assert_eq!(unique.len(), 59);
    }

    #[tokio::test]
    async fn test_failed_address_does_not_block_others() {
        let ledger = Arc::new(
            FakeLedger::new()
                .with_account("addr1", 100, 3)
                .with_account("addr3", 300, 75),
        );
        let orchestrator = orchestrator(ledger, fast_config());
        let addresses = vec![
            "addr1".to_string(),
            "addr2".to_string(),
            "addr3".to_string(),
        ];

        let report = orchestrator.sync_addresses(&addresses).await;

        let synced: Vec<&str> = report.snapshots.iter().map(|s| s.address.as_str()).collect();
        assert_eq!(synced, vec!["addr1", "addr3"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].address, "addr2");
        assert_eq!(report.stats.addresses_synced, 2);
        assert_eq!(report.stats.addresses_failed, 1);
        assert_eq!(report.stats.pages_fetched, 3);
        assert_eq!(report.stats.records_normalized, 78);
    }

    #[tokio::test(start_paused = true)]
    async fn test_addresses_are_paced() {
        let ledger = Arc::new(
            FakeLedger::new()
                .with_account("addr1", 1, 1)
                .with_account("addr2", 2, 1),
        );
        let orchestrator = orchestrator(ledger.clone(), SyncConfig::default());
        let start = Instant::now();

        orchestrator
            .sync_addresses(&["addr1".to_string(), "addr2".to_string()])
            .await;

        let times = ledger.call_times();
        assert_eq!(times[0].duration_since(start), Duration::ZERO);
        assert!(times[1].duration_since(times[0]) >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_address_pause_follows_last_page() {
        let ledger = Arc::new(
            FakeLedger::new()
                .with_account("addr1", 1, 120)
                .with_account("addr2", 2, 1),
        );
        let orchestrator = orchestrator(ledger.clone(), SyncConfig::default());

        orchestrator
            .sync_addresses(&["addr1".to_string(), "addr2".to_string()])
            .await;

        // addr1 spends 30s paging; addr2 still waits a full interval after its last page.
        let times = ledger.call_times();
        assert_eq!(times.len(), 4);
        assert!(times[3].duration_since(times[2]) >= Duration::from_secs(30));
    }
}
