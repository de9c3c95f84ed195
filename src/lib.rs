//! CQL load-testing core.
//!
//! Converts comma separated test arguments into typed CQL values, executes
//! them through a pluggable [`Session`] with per-connection prepared
//! statement caching and optional dynamic batching, and serializes results
//! back into tab separated text and test variables.

pub mod batch;
pub mod config;
pub mod cql;
pub mod error;
pub mod result;
pub mod sampler;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchAccumulator, BatchState};
pub use config::{ElementConfig, SamplerSettings};
pub use cql::{ColumnDescriptor, Consistency, CqlType, CqlValue, DecodeError, StatementCacheRegistry};
pub use error::{ErrorCategory, Result, SamplerError};
pub use result::{ResultSerializer, ResultTable, Row, Variables};
pub use sampler::{CqlElement, CqlProcessor, CqlSampler, QueryKind, SampleResult};
pub use session::{ConnectionId, Session, SessionError, SessionHandle, SessionRegistry, TestStateListener};
