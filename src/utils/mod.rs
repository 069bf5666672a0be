//!
//! Utility module for the wallet tracker.
//!
//! Re-exports formatting helpers used by the command line front end.
/// Utility functions for formatting and display
pub mod index;

pub use index::{format_coin_amount, BTC_DECIMALS};
