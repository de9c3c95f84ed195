//! Sampler configuration.
//!
//! `SamplerSettings` holds process-wide settings read from host properties.
//! `ElementConfig` holds what one test element is configured with.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cql::statement::StatementCache;
use crate::error::{Result, SamplerError};

/// Host property holding the null marker.
pub const NULL_MARKER_PROPERTY: &str = "cassandrasampler.nullmarker";
/// Host property holding the per-connection statement cache capacity.
pub const MAX_OPEN_PREPARED_STATEMENTS_PROPERTY: &str = "cassandrasampler.maxopenpreparedstatements";

/// Default text written in place of a NULL value.
pub const DEFAULT_NULL_MARKER: &str = "]NULL[";

// ============================================================================
// Sampler Settings
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Text substituted for NULL in output; never empty by default
    pub null_marker: String,
    /// Statement cache capacity per connection
    pub max_open_prepared_statements: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            null_marker: DEFAULT_NULL_MARKER.to_string(),
            max_open_prepared_statements: StatementCache::DEFAULT_CAPACITY,
        }
    }
}

impl SamplerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from host properties, keeping defaults for absent keys.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(marker) = props.get(NULL_MARKER_PROPERTY) {
            settings.null_marker = marker.clone();
        }

        if let Some(raw) = props.get(MAX_OPEN_PREPARED_STATEMENTS_PROPERTY) {
            settings.max_open_prepared_statements = raw.trim().parse().map_err(|_| {
                SamplerError::Config(format!(
                    "{} must be a non-negative integer, got {:?}",
                    MAX_OPEN_PREPARED_STATEMENTS_PROPERTY, raw
                ))
            })?;
        }

        Ok(settings)
    }

    /// Set the null marker.
    pub fn null_marker(mut self, marker: &str) -> Self {
        self.null_marker = marker.to_string();
        self
    }

    /// Set the statement cache capacity per connection.
    pub fn max_open_prepared_statements(mut self, capacity: usize) -> Self {
        self.max_open_prepared_statements = capacity;
        self
    }
}

// ============================================================================
// Element Configuration
// ============================================================================

/// Per-element settings.
///
/// `query_type` and `consistency_level` are kept as text and validated when
/// the element executes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementConfig {
    pub session_name: String,
    pub query: String,
    pub query_type: String,
    pub query_arguments: String,
    pub variable_names: String,
    pub result_variable: String,
    pub consistency_level: String,
    pub batch_size: usize,
}

impl Default for ElementConfig {
    fn default() -> Self {
        Self {
            session_name: String::new(),
            query: String::new(),
            query_type: "Simple Statement".to_string(),
            query_arguments: String::new(),
            variable_names: String::new(),
            result_variable: String::new(),
            consistency_level: "ONE".to_string(),
            batch_size: 1,
        }
    }
}

impl ElementConfig {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Self::default()
        }
    }

    pub fn session_name(mut self, name: &str) -> Self {
        self.session_name = name.to_string();
        self
    }

    pub fn query_type(mut self, query_type: &str) -> Self {
        self.query_type = query_type.to_string();
        self
    }

    pub fn query_arguments(mut self, arguments: &str) -> Self {
        self.query_arguments = arguments.to_string();
        self
    }

    pub fn variable_names(mut self, names: &str) -> Self {
        self.variable_names = names.to_string();
        self
    }

    pub fn result_variable(mut self, name: &str) -> Self {
        self.result_variable = name.to_string();
        self
    }

    pub fn consistency_level(mut self, level: &str) -> Self {
        self.consistency_level = level.to_string();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the batch size from text. Unparsable input falls back to 1.
    pub fn set_batch_size(&mut self, raw: &str) {
        self.batch_size = match raw.trim().parse::<usize>() {
            Ok(size) => size.max(1),
            Err(_) => {
                tracing::warn!(batch_size = raw, "unparsable batch size, using 1");
                1
            }
        };
    }
}
