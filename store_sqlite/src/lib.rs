//! SQLite storage backend for the chama core.
//!
//! Implements every storage trait from `chama-store` on one `rusqlite`
//! connection. Write transactions start with `BEGIN IMMEDIATE`, so two
//! writers never interleave; a busy or locked database surfaces as
//! [`StoreError::Conflict`] and is retried by the caller's policy.

mod codec;
pub mod error;
pub mod integrity;
mod ledger;
mod meeting;
mod membership;
pub mod migration;
mod poll;
mod query;
pub(crate) mod schema;
mod shares;
mod wallet;

pub use error::SqliteError;
pub use integrity::{check_integrity, IntegrityReport};
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chama_store::{LedgerStore, LedgerTxn, RetryPolicy, StoreError};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::error::SqlResultExt;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The relational ledger store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

/// Transactional handle passed to [`LedgerStore`] closures.
pub struct SqliteTxn<'a> {
    conn: &'a Connection,
}

impl SqliteStore {
    /// Open or create the database at `path` and migrate it to the current schema.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        info!(path = %path.display(), "opening SQLite ledger");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        debug!("opening in-memory SQLite ledger");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, SqliteError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Migrator::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::from(SqliteError::Poisoned))
    }

    /// Verify the ledger invariants over the whole database.
    pub fn check_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let conn = self.lock()?;
        check_integrity(&conn)
    }
}

impl LedgerStore for SqliteStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db()?;
        let mut handle = SqliteTxn { conn: &tx };
        let out = f(&mut handle)?;
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().db()?;
        Ok(out)
    }

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .db()?;
        let mut handle = SqliteTxn { conn: &tx };
        let out = f(&mut handle);
        tx.rollback().db()?;
        out
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }
}
