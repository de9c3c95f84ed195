//! Test elements that run CQL against a session.
//!
//! `CqlElement` owns the execute pipeline:
//! query kind → statement (prepared through the cache, bound from the argument
//! line) → optional batching → execute → serialized result.
//! `CqlSampler` turns that into a `SampleResult`; `CqlProcessor` runs it for
//! its side effects on the variables and only logs failures.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::batch::{BatchAccumulator, BatchState};
use crate::config::{ElementConfig, SamplerSettings};
use crate::cql::arguments::{bind_arguments, split_arguments};
use crate::cql::registry::StatementCacheRegistry;
use crate::cql::statement::{Consistency, SimpleStatement, Statement};
use crate::error::{Result, SamplerError};
use crate::result::{ResultSerializer, Variables};
use crate::session::{SessionHandle, SessionRegistry};

// ============================================================================
// Query Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Unprepared, executed immediately.
    Simple,
    /// Prepared, bound and executed.
    Prepared,
    /// Prepared, bound and buffered until the batch size is reached.
    DynamicBatch,
}

impl QueryKind {
    pub const SIMPLE: &'static str = "Simple Statement";
    pub const PREPARED: &'static str = "Prepared Statement";
    pub const DYNAMIC_BATCH: &'static str = "Dynamic Batch";

    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Simple => Self::SIMPLE,
            QueryKind::Prepared => Self::PREPARED,
            QueryKind::DynamicBatch => Self::DYNAMIC_BATCH,
        }
    }
}

impl FromStr for QueryKind {
    type Err = SamplerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            Self::SIMPLE => Ok(QueryKind::Simple),
            Self::PREPARED => Ok(QueryKind::Prepared),
            Self::DYNAMIC_BATCH => Ok(QueryKind::DynamicBatch),
            other => Err(SamplerError::UnsupportedQueryType(other.to_string())),
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Element
// ============================================================================

/// One configured test element and its batch state.
pub struct CqlElement {
    name: String,
    config: ElementConfig,
    settings: Arc<SamplerSettings>,
    batch: BatchAccumulator,
}

impl CqlElement {
    pub fn new(name: &str, config: ElementConfig, settings: Arc<SamplerSettings>) -> Self {
        let batch = BatchAccumulator::new(config.batch_size);
        Self {
            name: name.to_string(),
            config,
            settings,
            batch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ElementConfig {
        &self.config
    }

    /// Statements waiting in the dynamic batch.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Run the configured query once.
    ///
    /// Returns `Ok(None)` when a dynamic batch is still accumulating and
    /// nothing was sent. Otherwise the result block is returned and `vars`
    /// updated.
    pub fn execute(
        &mut self,
        session: &SessionHandle,
        caches: &StatementCacheRegistry,
        vars: &mut Variables,
    ) -> Result<Option<String>> {
        tracing::debug!(element = %self.name, "executing cql");

        let kind: QueryKind = self.config.query_type.parse()?;
        let consistency: Consistency = self.config.consistency_level.parse()?;

        let statement = match kind {
            QueryKind::Simple => {
                // Simple statements carry no bind markers to receive arguments.
                let arguments = split_arguments(&self.config.query_arguments)?;
                if !arguments.is_empty() {
                    return Err(SamplerError::ArgumentCount {
                        expected: 0,
                        actual: arguments.len(),
                    });
                }
                Statement::Simple(SimpleStatement::new(&self.config.query).with_consistency(consistency))
            }
            QueryKind::Prepared | QueryKind::DynamicBatch => {
                let mut bound = caches.bind(session.id, session.session.as_ref(), &self.config.query)?;
                bind_arguments(&mut bound, &self.config.query_arguments)?;
                bound.set_consistency(consistency);

                if kind == QueryKind::Prepared {
                    Statement::Bound(bound)
                } else {
                    self.batch.set_batch_size(self.config.batch_size);
                    if self.batch.add(bound) == BatchState::Accumulating {
                        return Ok(None);
                    }
                    Statement::Batch(self.batch.flush(Some(consistency)))
                }
            }
        };

        let table = match session.session.execute(&statement) {
            Ok(table) => table,
            Err(e) => {
                if let Statement::Batch(batch) = &statement {
                    tracing::warn!(
                        element = %self.name,
                        statements = batch.len(),
                        error = %e,
                        "batch execution failed, buffer cleared"
                    );
                }
                return Err(e.into());
            }
        };

        let serializer = ResultSerializer::new(self.settings.null_marker.as_str())
            .variable_names(&self.config.variable_names)
            .result_variable(&self.config.result_variable);

        Ok(Some(serializer.serialize(table, vars)?))
    }
}

impl fmt::Display for CqlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.config.query_type, self.config.query)?;
        writeln!(f, "{}", self.config.query_arguments)
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Outcome of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub label: String,
    pub successful: bool,
    pub response_code: String,
    pub response_message: String,
    pub response_data: String,
    /// The element description, as sent.
    pub sampler_data: String,
    pub elapsed: Duration,
}

pub struct CqlSampler {
    element: CqlElement,
}

impl CqlSampler {
    pub fn new(element: CqlElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &CqlElement {
        &self.element
    }

    /// Execute once and record the outcome. Never fails.
    pub fn sample(
        &mut self,
        session: &SessionHandle,
        caches: &StatementCacheRegistry,
        vars: &mut Variables,
    ) -> SampleResult {
        let start = Instant::now();
        let sampler_data = self.element.to_string();
        let outcome = self.element.execute(session, caches, vars);
        let elapsed = start.elapsed();

        let (successful, response_code, response_message, response_data) = match outcome {
            Ok(Some(data)) => (true, "200", "OK".to_string(), data),
            Ok(None) => (true, "200", "Statement added to batch".to_string(), String::new()),
            Err(e) => {
                tracing::debug!(element = %self.element.name, error = %e, "sample failed");
                (false, "000", e.to_string(), String::new())
            }
        };

        SampleResult {
            label: self.element.name.clone(),
            successful,
            response_code: response_code.to_string(),
            response_message,
            response_data,
            sampler_data,
            elapsed,
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Runs an element before or after a sample, for its variables only.
pub struct CqlProcessor {
    element: CqlElement,
}

impl CqlProcessor {
    pub fn new(element: CqlElement) -> Self {
        Self { element }
    }

    /// Execute against the named session.
    ///
    /// A blank session name is a configuration error. Every other failure,
    /// including an unknown session, is logged and swallowed.
    pub fn process(&mut self, sessions: &SessionRegistry, vars: &mut Variables) -> Result<()> {
        let session_name = self.element.config.session_name.trim();
        if session_name.is_empty() {
            return Err(SamplerError::Config(format!(
                "Variable Name must not be null in {}",
                self.element.name
            )));
        }

        let Some(session) = sessions.get(session_name) else {
            tracing::warn!(
                element = %self.element.name,
                session = session_name,
                "no session registered under this name"
            );
            return Ok(());
        };

        match self.element.execute(&session, sessions.caches(), vars) {
            Ok(_) => {}
            Err(e @ SamplerError::Execution(_)) => {
                tracing::warn!(element = %self.element.name, error = %e, "IO problem");
            }
            Err(e) => {
                tracing::warn!(element = %self.element.name, error = %e, "execution problem");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::types::{ColumnDescriptor, CqlType, CqlValue};
    use crate::error::ErrorCategory;
    use crate::result::ResultTable;
    use crate::session::{Session, SessionError};
    use crate::testing::ScriptedSession;

    const INSERT: &str = "INSERT INTO t (k, v) VALUES (?, ?)";

    fn handle(session: &Arc<ScriptedSession>) -> SessionHandle {
        SessionHandle {
            id: crate::session::ConnectionId::new(1),
            session: Arc::clone(session) as Arc<dyn Session>,
        }
    }

    fn element(config: ElementConfig) -> CqlElement {
        CqlElement::new("cql", config, Arc::new(SamplerSettings::default()))
    }

    fn insert_session() -> Arc<ScriptedSession> {
        Arc::new(ScriptedSession::new().with_variables(INSERT, vec![CqlType::Int, CqlType::Text]))
    }

    #[test]
    fn test_query_kind_parsing() {
        assert_eq!("Simple Statement".parse::<QueryKind>().unwrap(), QueryKind::Simple);
        assert_eq!("Dynamic Batch".parse::<QueryKind>().unwrap().to_string(), "Dynamic Batch");
        let err = "Callable Statement".parse::<QueryKind>().unwrap_err();
        assert!(matches!(&err, SamplerError::UnsupportedQueryType(s) if s == "Callable Statement"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_simple_statement_executes_immediately() {
        let table = ResultTable::new(vec![ColumnDescriptor::new("k", CqlType::Int)])
            .with_row([CqlValue::Int(1)])
            .unwrap();
        let session = Arc::new(ScriptedSession::new().with_result("SELECT k FROM t", table));
        let mut el = element(ElementConfig::new("SELECT k FROM t").consistency_level("QUORUM"));
        let mut vars = Variables::new();

        let out = el
            .execute(&handle(&session), &StatementCacheRegistry::default(), &mut vars)
            .unwrap();
        assert_eq!(out.as_deref(), Some("k\n1\n"));

        let executed = session.executed();
        assert!(matches!(&executed[0], Statement::Simple(s) if s.consistency == Some(Consistency::Quorum)));
        assert_eq!(session.prepare_count("SELECT k FROM t"), 0);
    }

    #[test]
    fn test_simple_statement_rejects_arguments() {
        let session = Arc::new(ScriptedSession::new());
        let mut el = element(ElementConfig::new("SELECT k FROM t").query_arguments("1,2,3,4,5"));

        let err = el
            .execute(&handle(&session), &StatementCacheRegistry::default(), &mut Variables::new())
            .unwrap_err();
        assert!(matches!(err, SamplerError::ArgumentCount { expected: 0, actual: 5 }));
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(session.executed().is_empty());

        // Whitespace-only arguments count as none.
        let mut el = element(ElementConfig::new("SELECT k FROM t").query_arguments("   "));
        el.execute(&handle(&session), &StatementCacheRegistry::default(), &mut Variables::new())
            .unwrap();
        assert_eq!(session.executed().len(), 1);
    }

    #[test]
    fn test_prepared_statement_binds_arguments() {
        let session = insert_session();
        let caches = StatementCacheRegistry::default();
        let mut el = element(
            ElementConfig::new(INSERT)
                .query_type("Prepared Statement")
                .query_arguments("1,one"),
        );

        el.execute(&handle(&session), &caches, &mut Variables::new()).unwrap();
        el.execute(&handle(&session), &caches, &mut Variables::new()).unwrap();

        assert_eq!(session.prepare_count(INSERT), 1);
        match &session.executed()[1] {
            Statement::Bound(b) => {
                assert_eq!(b.get(0), Some(&CqlValue::Int(1)));
                assert_eq!(b.get(1), Some(&CqlValue::Text("one".into())));
                assert_eq!(b.consistency(), Some(Consistency::One));
            }
            other => panic!("expected bound statement, got {:?}", other),
        }
    }

    #[test]
    fn test_argument_count_mismatch_sends_nothing() {
        let session = insert_session();
        let mut el = element(
            ElementConfig::new(INSERT)
                .query_type("Prepared Statement")
                .query_arguments("1"),
        );

        let err = el
            .execute(&handle(&session), &StatementCacheRegistry::default(), &mut Variables::new())
            .unwrap_err();
        assert!(matches!(err, SamplerError::ArgumentCount { expected: 2, actual: 1 }));
        assert!(session.executed().is_empty());
    }

    #[test]
    fn test_dynamic_batch_flushes_at_size() {
        let session = insert_session();
        let caches = StatementCacheRegistry::default();
        let mut el = element(
            ElementConfig::new(INSERT)
                .query_type("Dynamic Batch")
                .query_arguments("1,one")
                .batch_size(3),
        );
        let mut vars = Variables::new();

        assert_eq!(el.execute(&handle(&session), &caches, &mut vars).unwrap(), None);
        assert_eq!(el.execute(&handle(&session), &caches, &mut vars).unwrap(), None);
        assert!(session.executed().is_empty());
        assert_eq!(el.pending(), 2);

        assert!(el.execute(&handle(&session), &caches, &mut vars).unwrap().is_some());
        assert_eq!(el.pending(), 0);

        let executed = session.executed();
        assert_eq!(executed.len(), 1);
        assert!(matches!(&executed[0], Statement::Batch(b) if b.len() == 3));
    }

    #[test]
    fn test_failed_batch_still_clears_buffer() {
        let session = Arc::new(
            ScriptedSession::new()
                .with_variables(INSERT, vec![CqlType::Int, CqlType::Text])
                .failing_execute(SessionError::Cancelled),
        );
        let caches = StatementCacheRegistry::default();
        let mut el = element(
            ElementConfig::new(INSERT)
                .query_type("Dynamic Batch")
                .query_arguments("1,one")
                .batch_size(2),
        );
        let mut vars = Variables::new();

        el.execute(&handle(&session), &caches, &mut vars).unwrap();
        let err = el.execute(&handle(&session), &caches, &mut vars).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Execution);
        assert_eq!(el.pending(), 0);
    }

    #[test]
    fn test_invalid_consistency_is_fatal() {
        let session = Arc::new(ScriptedSession::new());
        let mut el = element(ElementConfig::new("SELECT 1").consistency_level("MOSTLY"));
        let err = el
            .execute(&handle(&session), &StatementCacheRegistry::default(), &mut Variables::new())
            .unwrap_err();
        assert!(err.to_string().contains("MOSTLY"));
        assert!(session.executed().is_empty());
    }

    #[test]
    fn test_element_display() {
        let el = element(
            ElementConfig::new(INSERT)
                .query_type("Prepared Statement")
                .query_arguments("1,one"),
        );
        assert_eq!(el.to_string(), format!("[Prepared Statement] {}\n1,one\n", INSERT));
    }

    #[test]
    fn test_sampler_reports_failures_as_unsuccessful() {
        let session = Arc::new(ScriptedSession::new().failing_execute(SessionError::Server("boom".into())));
        let mut sampler = CqlSampler::new(element(ElementConfig::new("SELECT 1")));

        let result = sampler.sample(&handle(&session), &StatementCacheRegistry::default(), &mut Variables::new());
        assert!(!result.successful);
        assert!(result.response_message.contains("boom"));
        assert_eq!(result.label, "cql");
        assert_eq!(result.sampler_data, "[Simple Statement] SELECT 1\n\n");
    }

    #[test]
    fn test_sampler_success_carries_data() {
        let session = Arc::new(ScriptedSession::new());
        let mut sampler = CqlSampler::new(element(ElementConfig::new("UPDATE t SET v = 1")));

        let result = sampler.sample(&handle(&session), &StatementCacheRegistry::default(), &mut Variables::new());
        assert!(result.successful);
        assert_eq!(result.response_code, "200");
        assert_eq!(result.response_data, "\n");
    }

    #[test]
    fn test_processor_requires_session_name() {
        let mut processor = CqlProcessor::new(element(ElementConfig::new("SELECT 1")));
        let err = processor
            .process(&SessionRegistry::new(), &mut Variables::new())
            .unwrap_err();
        assert!(matches!(err, SamplerError::Config(_)));
    }

    #[test]
    fn test_processor_swallows_execution_failures() {
        let sessions = SessionRegistry::new();
        let session = Arc::new(ScriptedSession::new().failing_execute(SessionError::Timeout("read".into())));
        sessions.register("main", session.clone());

        let mut processor = CqlProcessor::new(element(ElementConfig::new("SELECT 1").session_name("main")));
        processor
            .process(&sessions, &mut Variables::new())
            .unwrap();
        assert_eq!(session.executed().len(), 1);

        let mut missing = CqlProcessor::new(element(ElementConfig::new("SELECT 1").session_name("other")));
        missing
            .process(&sessions, &mut Variables::new())
            .unwrap();
    }

    #[test]
    fn test_processor_sets_variables() {
        let table = ResultTable::new(vec![ColumnDescriptor::new("v", CqlType::Text)])
            .with_row([CqlValue::Text("x".into())])
            .unwrap();
        let sessions = SessionRegistry::new();
        sessions.register("main", Arc::new(ScriptedSession::new().with_result("SELECT v FROM t", table)));

        let mut processor = CqlProcessor::new(element(
            ElementConfig::new("SELECT v FROM t")
                .session_name("main")
                .variable_names("v"),
        ));
        let mut vars = Variables::new();
        processor
            .process(&sessions, &mut vars)
            .unwrap();
        assert_eq!(vars.get("v_1"), Some("x"));
        assert_eq!(vars.get("v_#"), Some("1"));
    }

    #[test]
    fn test_processor_prepares_into_registry_caches() {
        let sessions = SessionRegistry::from_settings(&SamplerSettings::new().max_open_prepared_statements(5));
        let handle = sessions.register("main", insert_session() as Arc<dyn Session>);

        let mut processor = CqlProcessor::new(element(
            ElementConfig::new(INSERT)
                .session_name("main")
                .query_type(QueryKind::PREPARED)
                .query_arguments("1,'a'"),
        ));
        processor.process(&sessions, &mut Variables::new()).unwrap();
        processor.process(&sessions, &mut Variables::new()).unwrap();
        assert_eq!(sessions.caches().cache_len(handle.id), 1);

        sessions.close("main");
        assert!(!sessions.caches().contains(handle.id));
    }
}
