//! Per-connection prepared statement caches.
//!
//! One `StatementCache` exists per live connection, created lazily on first
//! use. The outer map is shared by every caller thread, so it sits behind a
//! lock; each inner cache has its own lock so different connections never
//! contend on preparation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SamplerSettings;
use crate::session::{ConnectionId, Session, SessionResult, TestStateListener};

use super::statement::{BoundStatement, PreparedStatement, StatementCache};

pub struct StatementCacheRegistry {
    capacity: usize,
    caches: Mutex<HashMap<ConnectionId, Arc<Mutex<StatementCache>>>>,
}

impl StatementCacheRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Registry whose caches hold `max_open_prepared_statements` entries each.
    pub fn from_settings(settings: &SamplerSettings) -> Self {
        Self::new(settings.max_open_prepared_statements)
    }

    /// Capacity given to each per-connection cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn cache_for(&self, conn: ConnectionId) -> Arc<Mutex<StatementCache>> {
        let mut caches = self.caches.lock();
        Arc::clone(
            caches
                .entry(conn)
                .or_insert_with(|| Arc::new(Mutex::new(StatementCache::new(self.capacity)))),
        )
    }

    /// Get the prepared template for `query` on `conn`, preparing it through
    /// `session` on a miss.
    pub fn prepare(
        &self,
        conn: ConnectionId,
        session: &dyn Session,
        query: &str,
    ) -> SessionResult<Arc<PreparedStatement>> {
        let cache = self.cache_for(conn);
        let mut cache = cache.lock();
        cache.get_or_prepare(query, |q| session.prepare(q))
    }

    /// Get the template for `query` and bind a fresh statement from it.
    pub fn bind(
        &self,
        conn: ConnectionId,
        session: &dyn Session,
        query: &str,
    ) -> SessionResult<BoundStatement> {
        Ok(self.prepare(conn, session, query)?.bind())
    }

    /// Drop the cache of one connection.
    pub fn remove(&self, conn: ConnectionId) -> bool {
        self.caches.lock().remove(&conn).is_some()
    }

    /// Drop every cache.
    pub fn clear(&self) {
        let mut caches = self.caches.lock();
        let count = caches.len();
        caches.clear();
        tracing::info!(connections = count, "cleared prepared statement caches");
    }

    /// Number of connections with a cache.
    pub fn len(&self) -> usize {
        self.caches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.lock().is_empty()
    }

    /// Number of statements cached for `conn`.
    pub fn cache_len(&self, conn: ConnectionId) -> usize {
        let cache = self.caches.lock().get(&conn).cloned();
        cache.map(|c| c.lock().len()).unwrap_or(0)
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.caches.lock().contains_key(&conn)
    }
}

impl Default for StatementCacheRegistry {
    fn default() -> Self {
        Self::new(StatementCache::DEFAULT_CAPACITY)
    }
}

impl TestStateListener for StatementCacheRegistry {
    fn test_started(&self) {
        self.clear();
    }

    fn test_ended(&self) {
        self.clear();
    }
}
