//! Store handle: a pool of SQLite connections plus the transaction runner
//! every repository goes through.

mod guard;
mod pool;

use std::path::Path;
use std::thread;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
    config::{FeedConfig, RetryPolicy, SqliteConfig},
    errors::FeedGraphError,
    metrics::StoreMetrics,
    schema::ensure_schema,
};

pub use guard::{TransactionGuard, TransactionMode};
pub use pool::PooledConnection;

use pool::ConnectionPool;

/// Explicitly constructed handle to the relational store.
///
/// Open it once at startup and share it (`Arc<Store>`) with every
/// repository. Dropping the last handle closes all connections.
pub struct Store {
    pool: ConnectionPool,
    metrics: StoreMetrics,
    retry: RetryPolicy,
    in_memory: bool,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P, cfg: &FeedConfig) -> Result<Self, FeedGraphError> {
        let path = path.as_ref();
        let size = cfg.sqlite.pool_size.max(1);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path)
                .map_err(|e| FeedGraphError::fatal(format!("connection: {e}")))?;
            configure_connection(&conn, &cfg.sqlite, true)?;
            if connections.is_empty() {
                ensure_schema(&conn)?;
            }
            connections.push(conn);
        }
        info!(path = %path.display(), pool_size = size, "store opened");
        Ok(Self::from_connections(connections, cfg, false))
    }

    /// In-memory databases are private to their connection, so the pool
    /// holds exactly one.
    pub fn open_in_memory(cfg: &FeedConfig) -> Result<Self, FeedGraphError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FeedGraphError::fatal(format!("connection: {e}")))?;
        configure_connection(&conn, &cfg.sqlite, false)?;
        ensure_schema(&conn)?;
        debug!("in-memory store opened");
        Ok(Self::from_connections(vec![conn], cfg, true))
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Borrows a connection outside any transaction. Blocks while every
    /// pooled connection is in use.
    pub fn checkout(&self) -> PooledConnection<'_> {
        self.pool.checkout()
    }

    /// Runs `f` in one `BEGIN IMMEDIATE` transaction.
    ///
    /// On a transient error the transaction is rolled back and `f` runs
    /// again from scratch, up to the configured retry budget. Any other
    /// error rolls back and is returned unchanged.
    pub fn write<R, F>(&self, label: &'static str, f: F) -> Result<R, FeedGraphError>
    where
        F: FnMut(&Connection) -> Result<R, FeedGraphError>,
    {
        self.run(TransactionMode::Immediate, label, f)
    }

    /// Runs `f` in one deferred transaction so multi-statement reads share a
    /// snapshot.
    pub fn read<R, F>(&self, label: &'static str, f: F) -> Result<R, FeedGraphError>
    where
        F: FnMut(&Connection) -> Result<R, FeedGraphError>,
    {
        self.run(TransactionMode::Deferred, label, f)
    }

    fn run<R, F>(
        &self,
        mode: TransactionMode,
        label: &'static str,
        mut f: F,
    ) -> Result<R, FeedGraphError>
    where
        F: FnMut(&Connection) -> Result<R, FeedGraphError>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = {
                let conn = self.pool.checkout();
                TransactionGuard::begin(&conn, mode, &self.metrics)
                    .and_then(|guard| guard.execute(&mut f))
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    self.metrics.record_retry();
                    let delay = self.retry.backoff(attempt);
                    warn!(label, attempt, ?delay, error = %err, "transient failure, retrying transaction");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    debug!(label, attempt, error = %err, "transaction rolled back");
                    return Err(err);
                }
            }
        }
    }

    fn from_connections(connections: Vec<Connection>, cfg: &FeedConfig, in_memory: bool) -> Self {
        Self {
            pool: ConnectionPool::new(connections),
            metrics: StoreMetrics::default(),
            retry: cfg.retry.clone(),
            in_memory,
        }
    }
}

fn configure_connection(
    conn: &Connection,
    cfg: &SqliteConfig,
    file_backed: bool,
) -> Result<(), FeedGraphError> {
    conn.set_prepared_statement_cache_capacity(cfg.cache_size);
    conn.busy_timeout(cfg.busy_timeout)
        .map_err(|e| FeedGraphError::fatal(format!("busy_timeout: {e}")))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| FeedGraphError::fatal(format!("PRAGMA foreign_keys: {e}")))?;

    if file_backed {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| FeedGraphError::fatal(format!("PRAGMA journal_mode: {e}")))?;
        if !mode.eq_ignore_ascii_case("wal") {
            // Some filesystems cannot host the WAL index.
            warn!(journal_mode = %mode, "WAL unavailable, using rollback journal");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| FeedGraphError::fatal(format!("PRAGMA synchronous: {e}")))?;
    }

    for (key, value) in &cfg.pragma_settings {
        let pragma_sql = format!("PRAGMA {key} = {value}");
        match conn.execute(&pragma_sql, []) {
            Ok(_) | Err(rusqlite::Error::ExecuteReturnedResults) => {}
            Err(e) => {
                return Err(FeedGraphError::fatal(format!(
                    "PRAGMA {key} = {value}: {e}"
                )));
            }
        }
    }
    Ok(())
}
