//! Tracks a set of ledger addresses and mirrors their balance and transaction
//! history from a block explorer into a local SQLite store.

pub mod config;
pub mod explorer;
pub mod store;
pub mod utils;
pub mod wallet;
