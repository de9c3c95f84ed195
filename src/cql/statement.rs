//! Statements and prepared statement caching.
//!
//! This module provides:
//! - `PreparedStatement`: a server-side prepared query template
//! - `BoundStatement`: a fresh set of values bound to a template
//! - `SimpleStatement` / `BatchStatement` / `Statement`: what gets executed
//! - `StatementCache`: O(1) LRU cache of templates for one connection

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use lru::LruCache;

use crate::error::SamplerError;

use super::error::BindError;
use super::types::{ColumnDescriptor, CqlValue};

/// Shared column descriptions - wrapped in Arc so every bound statement can
/// reference its template's metadata without cloning it.
pub type SharedColumns = Arc<Vec<ColumnDescriptor>>;

// ============================================================================
// Consistency
// ============================================================================

/// Consistency level requested for a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl Consistency {
    pub fn as_str(self) -> &'static str {
        match self {
            Consistency::Any => "ANY",
            Consistency::One => "ONE",
            Consistency::Two => "TWO",
            Consistency::Three => "THREE",
            Consistency::Quorum => "QUORUM",
            Consistency::All => "ALL",
            Consistency::LocalQuorum => "LOCAL_QUORUM",
            Consistency::EachQuorum => "EACH_QUORUM",
            Consistency::Serial => "SERIAL",
            Consistency::LocalSerial => "LOCAL_SERIAL",
            Consistency::LocalOne => "LOCAL_ONE",
        }
    }
}

impl FromStr for Consistency {
    type Err = SamplerError;

    /// Names are matched exactly, e.g. `LOCAL_QUORUM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANY" => Ok(Consistency::Any),
            "ONE" => Ok(Consistency::One),
            "TWO" => Ok(Consistency::Two),
            "THREE" => Ok(Consistency::Three),
            "QUORUM" => Ok(Consistency::Quorum),
            "ALL" => Ok(Consistency::All),
            "LOCAL_QUORUM" => Ok(Consistency::LocalQuorum),
            "EACH_QUORUM" => Ok(Consistency::EachQuorum),
            "SERIAL" => Ok(Consistency::Serial),
            "LOCAL_SERIAL" => Ok(Consistency::LocalSerial),
            "LOCAL_ONE" => Ok(Consistency::LocalOne),
            other => Err(SamplerError::InvalidConsistency(other.to_string())),
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Prepared Statement
// ============================================================================

/// A query template prepared by the server.
///
/// Templates are cached and shared; values are never stored on them. Each
/// execution binds a fresh `BoundStatement` via [`PreparedStatement::bind`].
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    /// Server-assigned identifier
    pub id: String,
    /// The CQL query text
    pub query: String,
    /// Bind variables, one per `?` marker, in order
    pub variables: SharedColumns,
    /// Result columns, when known at prepare time
    pub result_columns: SharedColumns,
}

impl PreparedStatement {
    /// Create a new prepared statement.
    pub fn new(id: impl Into<String>, query: impl Into<String>, variables: Vec<ColumnDescriptor>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            variables: Arc::new(variables),
            result_columns: Arc::new(Vec::new()),
        }
    }

    /// Set the result column descriptions.
    pub fn with_result_columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.result_columns = Arc::new(columns);
        self
    }

    /// Bind a fresh, empty set of values to this template.
    pub fn bind(self: &Arc<Self>) -> BoundStatement {
        BoundStatement {
            values: vec![None; self.variables.len()],
            prepared: Arc::clone(self),
            consistency: None,
        }
    }
}

// ============================================================================
// Bound Statement
// ============================================================================

/// A prepared template plus the values for one execution.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    prepared: Arc<PreparedStatement>,
    values: Vec<Option<CqlValue>>,
    consistency: Option<Consistency>,
}

impl BoundStatement {
    /// Set the value at a 0-based bind position.
    ///
    /// Errors report the 1-based position.
    pub fn set(&mut self, index: usize, value: CqlValue) -> Result<(), BindError> {
        let column = self
            .prepared
            .variables
            .get(index)
            .ok_or(BindError::MissingParameter { position: index + 1 })?;

        if !value.matches(&column.cql_type) {
            return Err(BindError::TypeMismatch {
                position: index + 1,
                source: super::error::DecodeError::mismatch(&column.cql_type, value.kind_name()),
            });
        }

        self.values[index] = Some(value);
        Ok(())
    }

    /// Get the value at a 0-based bind position, if set.
    pub fn get(&self, index: usize) -> Option<&CqlValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// 1-based positions that have no value yet.
    pub fn unset_positions(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// Check if every bind position has a value.
    pub fn is_fully_bound(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    pub fn values(&self) -> &[Option<CqlValue>] {
        &self.values
    }

    pub fn variables(&self) -> &[ColumnDescriptor] {
        &self.prepared.variables
    }

    pub fn prepared(&self) -> &Arc<PreparedStatement> {
        &self.prepared
    }

    pub fn query(&self) -> &str {
        &self.prepared.query
    }

    pub fn set_consistency(&mut self, consistency: Consistency) {
        self.consistency = Some(consistency);
    }

    pub fn consistency(&self) -> Option<Consistency> {
        self.consistency
    }
}

// ============================================================================
// Simple / Batch / Statement
// ============================================================================

/// An unprepared query sent as text.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleStatement {
    pub query: String,
    pub consistency: Option<Consistency>,
}

impl SimpleStatement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            consistency: None,
        }
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }
}

/// A group of bound statements executed together.
///
/// Batches are always unlogged: no atomicity beyond what each statement's
/// execution provides.
#[derive(Debug, Clone)]
pub struct BatchStatement {
    pub statements: Vec<BoundStatement>,
    pub consistency: Option<Consistency>,
}

impl BatchStatement {
    pub fn unlogged(statements: Vec<BoundStatement>) -> Self {
        Self {
            statements,
            consistency: None,
        }
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Anything a session can execute.
#[derive(Debug, Clone)]
pub enum Statement {
    Simple(SimpleStatement),
    Bound(BoundStatement),
    Batch(BatchStatement),
}

impl Statement {
    pub fn consistency(&self) -> Option<Consistency> {
        match self {
            Statement::Simple(s) => s.consistency,
            Statement::Bound(b) => b.consistency,
            Statement::Batch(b) => b.consistency,
        }
    }

    /// Query text for logging; batches report their first statement.
    pub fn query(&self) -> &str {
        match self {
            Statement::Simple(s) => &s.query,
            Statement::Bound(b) => b.query(),
            Statement::Batch(b) => b.statements.first().map(|s| s.query()).unwrap_or(""),
        }
    }
}

// ============================================================================
// Statement Cache (O(1) LRU)
// ============================================================================

/// O(1) LRU cache for prepared statements.
///
/// Each connection maintains its own statement cache to avoid re-preparing
/// frequently executed queries. Uses the `lru` crate for O(1) get/insert/evict.
///
/// Statements are stored as `Arc<PreparedStatement>` so a cache hit costs a
/// reference count increment rather than a copy of the template.
pub struct StatementCache {
    /// The LRU cache: query text → Arc<PreparedStatement>
    cache: LruCache<String, Arc<PreparedStatement>>,
}

impl StatementCache {
    /// Default capacity per connection.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Create a new statement cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
        }
    }

    /// Get a cached prepared statement by query text.
    ///
    /// Does NOT update LRU order (use `get_and_touch` for that).
    pub fn get(&self, query: &str) -> Option<Arc<PreparedStatement>> {
        self.cache.peek(query).map(Arc::clone)
    }

    /// Get a cached statement and mark it as recently used.
    pub fn get_and_touch(&mut self, query: &str) -> Option<Arc<PreparedStatement>> {
        self.cache.get(query).map(Arc::clone)
    }

    /// Check if a query is cached (without touching LRU order).
    #[inline]
    pub fn contains(&self, query: &str) -> bool {
        self.cache.contains(query)
    }

    /// Insert a prepared statement into the cache.
    ///
    /// If the cache is at capacity, the least recently used statement is
    /// evicted. Returns the evicted query text if any.
    pub fn insert(&mut self, query: String, statement: PreparedStatement) -> Option<String> {
        self.insert_arc(query, Arc::new(statement))
    }

    /// Insert an Arc-wrapped prepared statement into the cache.
    pub fn insert_arc(&mut self, query: String, statement: Arc<PreparedStatement>) -> Option<String> {
        let will_evict = self.cache.len() >= self.cache.cap().get() && !self.cache.contains(&query);

        let evicted = if will_evict {
            self.cache.peek_lru().map(|(q, _)| q.clone())
        } else {
            None
        };

        self.cache.put(query, statement);

        evicted
    }

    /// Return the cached template for `query`, preparing it on a miss.
    ///
    /// A hit marks the entry as recently used. A failed prepare leaves the
    /// cache unchanged.
    pub fn get_or_prepare<E>(
        &mut self,
        query: &str,
        prepare: impl FnOnce(&str) -> Result<PreparedStatement, E>,
    ) -> Result<Arc<PreparedStatement>, E> {
        if let Some(hit) = self.get_and_touch(query) {
            return Ok(hit);
        }

        tracing::debug!(query, "preparing statement");
        let statement = Arc::new(prepare(query)?);
        if let Some(evicted) = self.insert_arc(query.to_string(), Arc::clone(&statement)) {
            tracing::debug!(query = %evicted, "evicted least recently used statement");
        }
        Ok(statement)
    }

    /// Remove a statement from the cache.
    pub fn remove(&mut self, query: &str) -> Option<Arc<PreparedStatement>> {
        self.cache.pop(query)
    }

    /// Get the number of cached statements.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of statements held.
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Clear all cached statements.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Cached query texts, most recently used first.
    pub fn queries(&self) -> Vec<String> {
        self.cache.iter().map(|(q, _)| q.clone()).collect()
    }
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
