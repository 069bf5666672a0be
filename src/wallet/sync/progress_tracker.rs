//! Progress tracking for sync passes.
//!
//! This module provides the `SyncProgressTracker`, which counts explorer pages,
//! normalized records, merged duplicates and per-address outcomes for one sync
//! pass. The orchestrator logs progress through it and hands the final
//! statistics back to the caller in the pass report.

use tokio::time::Instant;
use tracing::info;

/// Service for tracking synchronization progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Explorer pages fetched in this pass
    pages_fetched: usize,
    /// Records normalized into transactions
    records_normalized: usize,
    /// Records dropped because their ordinal was already seen in this pass
    duplicates_merged: usize,
    /// Addresses that produced a snapshot
    addresses_synced: usize,
    /// Addresses whose sync failed
    addresses_failed: usize,
    /// When the pass started
    started_at: Instant,
    /// Pages fetched when progress was last logged
    last_logged_pages: usize,
}

impl SyncProgressTracker {
    /// Create a new progress tracker for a pass starting now.
    pub fn new() -> Self {
        Self {
            pages_fetched: 0,
            records_normalized: 0,
            duplicates_merged: 0,
            addresses_synced: 0,
            addresses_failed: 0,
            started_at: Instant::now(),
            last_logged_pages: 0,
        }
    }

    /// Record a fetched page and how many of its records were kept and merged
    pub fn record_page(&mut self, kept: usize, merged: usize) {
        self.pages_fetched += 1;
        self.records_normalized += kept;
        self.duplicates_merged += merged;
    }

    pub fn record_address_synced(&mut self) {
        self.addresses_synced += 1;
    }

    pub fn record_address_failed(&mut self) {
        self.addresses_failed += 1;
    }

    /// Log progress every 10 pages or when forced
    pub fn log_progress(&mut self, force: bool) {
        let pages_since_last_log = self.pages_fetched.saturating_sub(self.last_logged_pages);
        let should_log = force || pages_since_last_log >= 10;

        if should_log && self.pages_fetched > 0 {
            info!(
                "Sync progress: {} pages, {} transactions, {} addresses done, {} failed",
                self.pages_fetched,
                self.records_normalized,
                self.addresses_synced,
                self.addresses_failed
            );
            self.last_logged_pages = self.pages_fetched;
        }
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            pages_fetched: self.pages_fetched,
            records_normalized: self.records_normalized,
            duplicates_merged: self.duplicates_merged,
            addresses_synced: self.addresses_synced,
            addresses_failed: self.addresses_failed,
            elapsed: self.started_at.elapsed(),
        }
    }
}

impl Default for SyncProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about a sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub pages_fetched: usize,
    pub records_normalized: usize,
    pub duplicates_merged: usize,
    pub addresses_synced: usize,
    pub addresses_failed: usize,
    pub elapsed: std::time::Duration,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "{} addresses synced in {:.1}s: {} pages, {} transactions{}{}",
            self.addresses_synced,
            self.elapsed.as_secs_f64(),
            self.pages_fetched,
            self.records_normalized,
            if self.duplicates_merged == 0 {
                String::new()
            } else {
                format!(" ({} duplicates merged)", self.duplicates_merged)
            },
            if self.addresses_failed == 0 {
                String::new()
            } else {
                format!(", {} addresses failed", self.addresses_failed)
            }
        )
    }
}
