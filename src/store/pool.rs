use std::ops::Deref;

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;

/// Fixed-size set of connections to one database.
///
/// `checkout` parks the calling thread until a connection is idle.
pub(crate) struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    size: usize,
}

impl ConnectionPool {
    pub(crate) fn new(connections: Vec<Connection>) -> Self {
        let size = connections.len();
        Self {
            idle: Mutex::new(connections),
            available: Condvar::new(),
            size,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub(crate) fn checkout(&self) -> PooledConnection<'_> {
        let mut idle = self.idle.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return PooledConnection {
                    pool: self,
                    conn: Some(conn),
                };
            }
            self.available.wait(&mut idle);
        }
    }

    fn give_back(&self, conn: Connection) {
        self.idle.lock().push(conn);
        self.available.notify_one();
    }
}

/// A connection borrowed from the pool; returned on drop.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection used after release")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn checkout_returns_connection_on_drop() {
        let pool = ConnectionPool::new(vec![Connection::open_in_memory().unwrap()]);
        assert_eq!(pool.idle_count(), 1);
        {
            let conn = pool.checkout();
            let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
            assert_eq!(one, 1);
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn waiting_checkout_wakes_when_connection_returns() {
        let pool = Arc::new(ConnectionPool::new(vec![
            Connection::open_in_memory().unwrap(),
        ]));
        let held = pool.checkout();
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let conn = pool.checkout();
                conn.query_row("SELECT 2", [], |row| row.get::<_, i64>(0))
                    .unwrap()
            })
        };
        drop(held);
        assert_eq!(waiter.join().unwrap(), 2);
        assert_eq!(pool.size(), 1);
    }
}
