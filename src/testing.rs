//! In-memory session double for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::cql::statement::{PreparedStatement, Statement};
use crate::cql::types::{ColumnDescriptor, CqlType};
use crate::result::ResultTable;
use crate::session::{Session, SessionError, SessionResult};

/// A session that answers from canned data and records what it was sent.
///
/// Unless configured with `with_variables`, a prepared query gets one `text`
/// variable per `?` marker.
#[derive(Default)]
pub struct ScriptedSession {
    variables: HashMap<String, Vec<CqlType>>,
    results: HashMap<String, ResultTable>,
    failing_prepares: Vec<String>,
    execute_error: Option<SessionError>,
    prepares: Mutex<Vec<String>>,
    executed: Mutex<Vec<Statement>>,
    closed: AtomicBool,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(mut self, query: &str, types: Vec<CqlType>) -> Self {
        self.variables.insert(query.to_string(), types);
        self
    }

    pub fn with_result(mut self, query: &str, table: ResultTable) -> Self {
        self.results.insert(query.to_string(), table);
        self
    }

    pub fn failing_prepare(mut self, query: &str) -> Self {
        self.failing_prepares.push(query.to_string());
        self
    }

    pub fn failing_execute(mut self, error: SessionError) -> Self {
        self.execute_error = Some(error);
        self
    }

    pub fn prepare_count(&self, query: &str) -> usize {
        self.prepares.lock().iter().filter(|q| *q == query).count()
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Session for ScriptedSession {
    fn prepare(&self, query: &str) -> SessionResult<PreparedStatement> {
        self.prepares.lock().push(query.to_string());
        if self.failing_prepares.iter().any(|q| q == query) {
            return Err(SessionError::Prepare(format!("line 1:0 no viable alternative: {}", query)));
        }

        let types = self
            .variables
            .get(query)
            .cloned()
            .unwrap_or_else(|| vec![CqlType::Text; query.matches('?').count()]);
        let variables = types
            .into_iter()
            .enumerate()
            .map(|(i, ty)| ColumnDescriptor::new(format!("v{}", i), ty))
            .collect();

        let id = format!("stmt-{}", self.prepares.lock().len());
        Ok(PreparedStatement::new(id, query, variables))
    }

    fn execute(&self, statement: &Statement) -> SessionResult<ResultTable> {
        self.executed.lock().push(statement.clone());
        if let Some(err) = &self.execute_error {
            return Err(err.clone());
        }
        Ok(self
            .results
            .get(statement.query())
            .cloned()
            .unwrap_or_else(ResultTable::empty))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
