//! Sessions to the database and the registry that owns them.
//!
//! The transport itself lives outside this crate. A `Session` prepares and
//! executes statements; the `SessionRegistry` hands out named sessions and
//! gives each a `ConnectionId` that keys its prepared statement cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::SamplerSettings;
use crate::cql::registry::StatementCacheRegistry;
use crate::cql::statement::{PreparedStatement, Statement};
use crate::result::ResultTable;

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by the transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("No host available: {0}")]
    Unavailable(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Could not prepare statement: {0}")]
    Prepare(String),

    #[error("Session is closed")]
    Closed,
}

impl SessionError {
    /// Whether the transport considers the failure transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Unavailable(_) | SessionError::Timeout(_))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ============================================================================
// Session
// ============================================================================

/// A live connection to the database.
///
/// Calls block until the round-trip completes. Cancellation and timeouts
/// are the implementation's business and surface as `SessionError`.
pub trait Session: Send + Sync {
    /// Prepare `query` on the server.
    fn prepare(&self, query: &str) -> SessionResult<PreparedStatement>;

    /// Execute a statement and return its (possibly empty) result.
    fn execute(&self, statement: &Statement) -> SessionResult<ResultTable>;

    /// Release the connection. Further calls may fail with `Closed`.
    fn close(&self) {}
}

/// Identity of a live session, used to key per-connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A session together with its connection identity.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: ConnectionId,
    pub session: Arc<dyn Session>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

// ============================================================================
// Test run lifecycle
// ============================================================================

/// Hooks fired by the host at test-run boundaries.
pub trait TestStateListener {
    fn test_started(&self);
    fn test_ended(&self);
}

// ============================================================================
// Session Registry
// ============================================================================

/// Named live sessions, created on first request.
///
/// The registry shares the prepared statement caches keyed by its
/// connection ids, and drops a connection's cache whenever that connection
/// leaves the registry.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    caches: Arc<StatementCacheRegistry>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry sharing an existing set of statement caches.
    pub fn with_caches(caches: Arc<StatementCacheRegistry>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            caches,
            next_id: AtomicU64::new(0),
        }
    }

    /// Registry whose statement caches are sized from `settings`.
    pub fn from_settings(settings: &SamplerSettings) -> Self {
        Self::with_caches(Arc::new(StatementCacheRegistry::from_settings(settings)))
    }

    /// Prepared statement caches for the registered connections.
    pub fn caches(&self) -> &Arc<StatementCacheRegistry> {
        &self.caches
    }

    /// Return the session registered under `name`, connecting it on first use.
    ///
    /// The registry lock is held while connecting so two callers racing on
    /// the same name cannot both connect.
    pub fn get_or_connect<F>(&self, name: &str, connect: F) -> SessionResult<SessionHandle>
    where
        F: FnOnce() -> SessionResult<Arc<dyn Session>>,
    {
        let mut sessions = self.sessions.lock();
        if let Some(handle) = sessions.get(name) {
            return Ok(handle.clone());
        }

        let session = connect()?;
        let id = self.next_connection_id();
        tracing::debug!(session = name, connection = %id, "session connected");

        let handle = SessionHandle { id, session };
        sessions.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Look up an already registered session.
    pub fn get(&self, name: &str) -> Option<SessionHandle> {
        self.sessions.lock().get(name).cloned()
    }

    /// Register an existing session under `name`, replacing any previous one.
    ///
    /// A replaced session is closed and its statement cache dropped.
    pub fn register(&self, name: &str, session: Arc<dyn Session>) -> SessionHandle {
        let handle = SessionHandle {
            id: self.next_connection_id(),
            session,
        };
        let replaced = self.sessions.lock().insert(name.to_string(), handle.clone());
        if let Some(old) = replaced {
            self.release(name, old);
        }
        handle
    }

    /// Close one session and drop its statement cache.
    pub fn close(&self, name: &str) -> bool {
        let removed = self.sessions.lock().remove(name);
        match removed {
            Some(handle) => {
                self.release(name, handle);
                true
            }
            None => false,
        }
    }

    /// Close every session and drop their statement caches.
    pub fn destroy_all(&self) {
        let drained: Vec<(String, SessionHandle)> = self.sessions.lock().drain().collect();
        let count = drained.len();
        for (name, handle) in drained {
            self.release(&name, handle);
        }
        tracing::info!(sessions = count, "destroyed all sessions");
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn release(&self, name: &str, handle: SessionHandle) {
        self.caches.remove(handle.id);
        handle.session.close();
        tracing::debug!(session = name, connection = %handle.id, "session closed");
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl TestStateListener for SessionRegistry {
    fn test_started(&self) {}

    fn test_ended(&self) {
        self.destroy_all();
    }
}
