//! One live connection per `host:port`.
//!
//! A session keeps its pool behind a mutex and never holds the lock across
//! I/O: a connection is checked out (removed from the map) for one exchange
//! and checked back in only if the exchange left it reusable. Whatever is
//! checked out and not returned gets closed when its guard drops, so error
//! paths and panics cannot leak a half-read connection back into the pool.

use crate::connector::Connection;
use crate::target::PoolKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Write};

/// Mapping from pool key to its single live connection.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    entries: HashMap<PoolKey, Connection>,
}

impl ConnectionPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &PoolKey) -> Option<&Connection> {
        self.entries.get(key)
    }

    /// Remove the connection for `key` without closing it.
    pub fn take(&mut self, key: &PoolKey) -> Option<Connection> {
        self.entries.remove(key)
    }

    /// Store `conn` under `key`. A connection already stored there is closed.
    pub fn install(&mut self, key: PoolKey, conn: Connection) {
        if let Some(stale) = self.entries.insert(key, conn) {
            tracing::debug!(connection_id = stale.id(), "replaced pooled connection");
            stale.close();
        }
    }

    /// Close and remove the connection for `key`. Returns whether one existed.
    pub fn evict(&mut self, key: &PoolKey) -> bool {
        match self.entries.remove(key) {
            Some(conn) => {
                tracing::debug!(connection_id = conn.id(), %key, "evicted connection");
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Close and remove every connection.
    pub fn clear(&mut self) {
        for (_, conn) in self.entries.drain() {
            conn.close();
        }
    }

    #[must_use]
    pub fn contains(&self, key: &PoolKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PoolKey> {
        self.entries.keys()
    }
}

/// A connection checked out of a [`ConnectionPool`] for one exchange.
///
/// Dropping the guard closes the connection; [`release`](Self::release)
/// is the only way back into the pool.
pub struct PooledConnection<'a> {
    pool: &'a Mutex<ConnectionPool>,
    key: PoolKey,
    id: u64,
    reused: bool,
    conn: Option<Connection>,
}

impl<'a> PooledConnection<'a> {
    /// Check out the pooled connection for `key`, if any.
    #[must_use]
    pub fn checkout(pool: &'a Mutex<ConnectionPool>, key: &PoolKey) -> Option<Self> {
        let conn = pool.lock().take(key)?;
        Some(Self {
            pool,
            key: key.clone(),
            id: conn.id(),
            reused: true,
            conn: Some(conn),
        })
    }

    /// Wrap a newly opened connection destined for `key`.
    #[must_use]
    pub fn fresh(pool: &'a Mutex<ConnectionPool>, key: PoolKey, conn: Connection) -> Self {
        Self {
            pool,
            key,
            id: conn.id(),
            reused: false,
            conn: Some(conn),
        }
    }

    /// Whether this connection came out of the pool rather than being opened
    /// for this request.
    #[must_use]
    pub fn reused(&self) -> bool {
        self.reused
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// # Errors
    /// Propagates the socket option error.
    pub fn set_timeout(&self, timeout: Option<std::time::Duration>) -> io::Result<()> {
        match &self.conn {
            Some(conn) => conn.set_timeout(timeout),
            None => Err(not_connected()),
        }
    }

    /// Return the connection to the pool.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::trace!(connection_id = self.id, key = %self.key, "connection released to pool");
            self.pool.lock().install(self.key.clone(), conn);
        }
    }

    /// Close the connection instead of returning it.
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::trace!(connection_id = self.id, key = %self.key, "connection discarded");
            conn.close();
        }
    }

    fn conn_mut(&mut self) -> io::Result<&mut Connection> {
        self.conn.as_mut().ok_or_else(not_connected)
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection already released")
}

impl Read for PooledConnection<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.conn_mut()?.read(buf)
    }
}

impl Write for PooledConnection<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.conn_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.conn_mut()?.flush()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("reused", &self.reused)
            .finish_non_exhaustive()
    }
}
