//! Ledger explorer integration
//!
//! This module provides the client and types for reading address history from a
//! blockchain explorer's paginated `rawaddr` endpoint. Each call returns one page of
//! raw transaction records together with the address totals reported by the explorer.

/// HTTP client for the explorer's address endpoint
mod client;
/// Type definitions for explorer responses
mod types;

pub use client::{ExplorerClient, LedgerSource};
pub use types::*;
