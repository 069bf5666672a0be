//! Connection pool management.
//!
//! [`Database`] wraps an r2d2 pool of SQLite connections. Every connection is
//! initialized with foreign keys enabled and a busy timeout, so writers that
//! collide on SQLite's write lock wait for each other instead of failing.
//!
//! # Transactions
//!
//! Writes use `BEGIN IMMEDIATE`, which takes the write lock up front. Two
//! write transactions therefore never interleave, whichever task started them.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use super::error::DbError;
use super::schema::CREATE_SCHEMA;

/// A pooled SQLite connection, returned to the pool when dropped.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Default wait for a competing writer to release the write lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database handle with connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Opens a database at the given path, creating the file and its parent
    /// directory if necessary, and applies the schema.
    pub fn open(
        path: impl AsRef<Path>,
        pool_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self, DbError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let db = Self { pool };
        db.initialize(true)?;
        info!("Opened database at {}", path.display());
        Ok(db)
    }

    /// Opens an in-memory database, primarily for testing.
    ///
    /// The pool is limited to one connection since every in-memory connection
    /// is its own database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| configure_connection(conn, DEFAULT_BUSY_TIMEOUT));
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.initialize(false)?;
        Ok(db)
    }

    fn initialize(&self, wal: bool) -> Result<(), DbError> {
        let conn = self.connection()?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(())
    }

    /// Obtains a connection from the pool.
    pub fn connection(&self) -> Result<PooledConnection, DbError> {
        self.pool.get().map_err(DbError::from)
    }

    /// Executes a closure within an immediate write transaction.
    ///
    /// If the closure returns `Ok`, the transaction is committed. If it returns
    /// `Err`, the transaction is rolled back when dropped.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T, DbError>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Executes a closure with a database connection, for reads.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.connection()?;
        f(&conn)
    }
}

fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")
}
