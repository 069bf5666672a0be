//! Wallet Synchronization Module
//!
//! This module holds the engine that pulls address histories from the block
//! explorer and prepares them for storage. It is composed of several submodules:
//!
//! - `orchestrator`: Pages through each address's history and builds one snapshot per address.
//! - `normalizer`: Turns raw explorer records into transactions keyed by their ordinal.
//! - `rate_limiter`: Token bucket pacing shared by every outbound explorer call.
//! - `progress_tracker`: Counts pages, records and outcomes for one pass and logs progress.
//! - `runner`: Spawns sync passes one at a time and exposes their status and cancellation.
//!
//! The orchestrator never touches storage. The wallet service commits a pass's
//! snapshots in one write batch once every address has been fetched.

/// Raw record normalization
pub mod normalizer;
/// Per-address pagination and multi-address passes
pub mod orchestrator;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Outbound request pacing
pub mod rate_limiter;
/// Single-flight pass execution
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use normalizer::TransactionNormalizer;
pub use orchestrator::{AddressFailure, AddressSyncOrchestrator, SyncConfig, SyncReport};
pub use progress_tracker::{SyncProgressTracker, SyncStats};
pub use rate_limiter::RateLimiter;
pub use runner::{SyncHandle, SyncRunner, SyncStatus, SyncSummary};
