//! Single-flight execution of sync passes.
//!
//! [`SyncRunner`] spawns at most one sync pass at a time. Asking for a pass
//! while one is running returns a handle to the running pass instead of
//! starting a second one, so two passes can never stage conflicting writes.
//! Each pass gets a cancellation signal and publishes its status on a watch
//! channel that any number of [`SyncHandle`]s can poll or await.

use crate::wallet::WalletSyncError;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Result of a committed sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub addresses_synced: usize,
    pub addresses_failed: usize,
    pub transactions_inserted: usize,
    pub finished_at: DateTime<Utc>,
}

/// Lifecycle of a sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Running,
    Completed(SyncSummary),
    Failed(String),
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

/// Handle to a spawned sync pass.
///
/// Clones observe and control the same pass.
#[derive(Clone)]
pub struct SyncHandle {
    pass_id: u64,
    status: watch::Receiver<SyncStatus>,
    cancel: Arc<watch::Sender<bool>>,
}

impl SyncHandle {
    /// Identifier of the pass, unique within one runner.
    pub fn pass_id(&self) -> u64 {
        self.pass_id
    }

    /// Current status without waiting.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// True once the pass reached a terminal status or its task is gone.
    pub fn is_finished(&self) -> bool {
        self.status.borrow().is_terminal() || self.status.has_changed().is_err()
    }

    /// Ask the pass to stop.
    ///
    /// Cancellation takes effect at the next explorer request or pacing wait.
    /// A pass that already reached its commit phase runs to completion.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the pass to reach a terminal status.
    pub async fn wait(&self) -> SyncStatus {
        let mut status = self.status.clone();
        if let Ok(terminal) = status.wait_for(SyncStatus::is_terminal).await {
            return terminal.clone();
        }
        SyncStatus::Failed("sync task stopped without reporting a status".to_string())
    }
}

/// Spawns sync passes, never more than one at a time.
#[derive(Default)]
pub struct SyncRunner {
    current: Mutex<Option<SyncHandle>>,
    next_pass_id: AtomicU64,
}

impl SyncRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the most recent pass, running or finished.
    pub fn current(&self) -> Option<SyncHandle> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Start a pass built by `make_pass`, or join the pass already running.
    ///
    /// `make_pass` receives the cancellation signal for the new pass. It is not
    /// called when an existing pass is joined. Must be called within a Tokio runtime.
    pub fn start<F, Fut>(&self, make_pass: F) -> SyncHandle
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = Result<SyncSummary, WalletSyncError>> + Send + 'static,
    {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(handle) = current.as_ref() {
            if !handle.is_finished() {
                info!("Sync pass {} already running, joining it", handle.pass_id);
                return handle.clone();
            }
        }

        let pass_id = self.next_pass_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (status_tx, status_rx) = watch::channel(SyncStatus::Running);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = SyncHandle {
            pass_id,
            status: status_rx,
            cancel: Arc::new(cancel_tx),
        };

        let pass = make_pass(cancel_rx);
        info!("Starting sync pass {}", pass_id);
        let guard = StatusGuard {
            pass_id,
            status: status_tx,
        };
        tokio::spawn(async move {
            let status = match pass.await {
                Ok(summary) => {
                    info!(
                        "Sync pass {} completed: {} addresses synced, {} failed, {} new transactions",
                        pass_id,
                        summary.addresses_synced,
                        summary.addresses_failed,
                        summary.transactions_inserted
                    );
                    SyncStatus::Completed(summary)
                }
                Err(WalletSyncError::Cancelled) => {
                    info!("Sync pass {} cancelled", pass_id);
                    SyncStatus::Cancelled
                }
                Err(e) => {
                    error!("Sync pass {} failed: {}", pass_id, e);
                    SyncStatus::Failed(e.to_string())
                }
            };
            guard.status.send_replace(status);
        });

        *current = Some(handle.clone());
        handle
    }
}

/// Publishes `Failed` if a pass task goes away while still `Running`, which
/// happens when the pass panics or its task is aborted.
struct StatusGuard {
    pass_id: u64,
    status: watch::Sender<SyncStatus>,
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        let stopped = self.status.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            *status = SyncStatus::Failed("sync task stopped without reporting a status".to_string());
            true
        });
        if stopped {
            error!("Sync pass {} stopped without reporting a status", self.pass_id);
        }
    }
}

/// Resolves once cancellation is requested. Never resolves if the signal is dropped.
pub async fn cancelled(signal: &mut watch::Receiver<bool>) {
    if signal.wait_for(|cancel| *cancel).await.is_err() {
        std::future::pending::<()>().await;
    }
}
