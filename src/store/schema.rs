//! Database schema definitions.
//!
//! Two tables back the tracker:
//!
//! - `addresses`: the tracked set, keyed by address, with the last synced balance
//! - `transactions`: one row per `(address, tx_index)`, holding the explorer's
//!   original record as `payload`
//!
//! Deleting an address cascades to its transactions. The composite index serves
//! "all transactions for an address, newest first".

/// SQL schema applied on every open. Every statement is idempotent.
pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS addresses (
    address TEXT PRIMARY KEY,
    balance INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS transactions (
    address TEXT NOT NULL REFERENCES addresses(address) ON DELETE CASCADE,
    tx_index INTEGER NOT NULL,
    hash TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (address, tx_index)
);
CREATE INDEX IF NOT EXISTS transactions_address_index
    ON transactions(address, tx_index DESC);
"#;
