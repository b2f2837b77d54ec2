use rusqlite::Connection;
use tracing::debug;

use crate::{errors::FeedGraphError, metrics::StoreMetrics};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionMode {
    /// Read snapshot; takes no write lock until a write happens.
    Deferred,
    /// Takes SQLite's write lock at `BEGIN`, so every read inside the
    /// transaction sees the state it will write against.
    Immediate,
}

/// Scoped transaction with automatic rollback.
///
/// Nothing is committed unless [`commit`](Self::commit) or
/// [`execute`](Self::execute) succeeds. Dropping the guard in any other
/// state (error, early return, unwinding) rolls the transaction back.
pub struct TransactionGuard<'a> {
    conn: &'a Connection,
    metrics: &'a StoreMetrics,
    committed: bool,
}

impl<'a> TransactionGuard<'a> {
    pub fn begin(
        conn: &'a Connection,
        mode: TransactionMode,
        metrics: &'a StoreMetrics,
    ) -> Result<Self, FeedGraphError> {
        let sql = match mode {
            TransactionMode::Deferred => "BEGIN DEFERRED",
            TransactionMode::Immediate => "BEGIN IMMEDIATE",
        };
        conn.execute_batch(sql).map_err(FeedGraphError::store)?;
        metrics.record_begin();
        Ok(Self {
            conn,
            metrics,
            committed: false,
        })
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn commit(mut self) -> Result<(), FeedGraphError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(FeedGraphError::store)?;
        self.committed = true;
        self.metrics.record_commit();
        Ok(())
    }

    /// Runs `f` inside the transaction and commits if it returns `Ok`.
    pub fn execute<F, R>(self, f: F) -> Result<R, FeedGraphError>
    where
        F: FnOnce(&Connection) -> Result<R, FeedGraphError>,
    {
        let value = f(self.conn)?;
        self.commit()?;
        Ok(value)
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                debug!(error = %err, "rollback failed");
            }
        }
        self.metrics.record_rollback();
    }
}
