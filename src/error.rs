//! Error types for cqlkit.
//!
//! Every failure falls into one of four categories. None of them is retried
//! here; retry policy belongs to the session implementation.

use thiserror::Error;

use crate::cql::error::{BindError, DecodeError};
use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported query type: {0}")]
    UnsupportedQueryType(String),

    #[error("Invalid consistency level: {0}")]
    InvalidConsistency(String),

    #[error("number of arguments ({actual}) and number in stmt ({expected}) are not equal")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Could not decode argument no: {position} ({argument:?}): {source}")]
    Argument {
        position: usize,
        argument: String,
        #[source]
        source: DecodeError,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Could not set argument no: {0} - missing parameter marker?")]
    MissingParameter(usize),

    #[error("Could not set argument no: {position}: {source}")]
    TypeMismatch {
        position: usize,
        #[source]
        source: DecodeError,
    },

    #[error("Execution error: {0}")]
    Execution(#[from] SessionError),
}

/// Coarse classification of a [`SamplerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Decode,
    MissingParameter,
    Execution,
}

impl SamplerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SamplerError::Config(_)
            | SamplerError::UnsupportedQueryType(_)
            | SamplerError::InvalidConsistency(_)
            | SamplerError::ArgumentCount { .. } => ErrorCategory::Configuration,
            SamplerError::Argument { .. }
            | SamplerError::Decode(_)
            | SamplerError::TypeMismatch { .. } => ErrorCategory::Decode,
            SamplerError::MissingParameter(_) => ErrorCategory::MissingParameter,
            SamplerError::Execution(_) => ErrorCategory::Execution,
        }
    }

    /// True only for transport failures the session reports as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            SamplerError::Execution(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<BindError> for SamplerError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::MissingParameter { position } => SamplerError::MissingParameter(position),
            BindError::TypeMismatch { position, source } => {
                SamplerError::TypeMismatch { position, source }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SamplerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_count_message() {
        let err = SamplerError::ArgumentCount {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "number of arguments (2) and number in stmt (3) are not equal"
        );
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            SamplerError::UnsupportedQueryType("Fancy".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            SamplerError::from(DecodeError::InvalidHex("zz".into())).category(),
            ErrorCategory::Decode
        );
        assert_eq!(
            SamplerError::from(BindError::MissingParameter { position: 4 }).category(),
            ErrorCategory::MissingParameter
        );
        assert_eq!(
            SamplerError::from(SessionError::Timeout("read".into())).category(),
            ErrorCategory::Execution
        );
    }

    #[test]
    fn test_missing_parameter_keeps_position() {
        let err = SamplerError::from(BindError::MissingParameter { position: 4 });
        assert!(matches!(err, SamplerError::MissingParameter(4)));
        assert!(err.to_string().contains("argument no: 4"));
    }

    #[test]
    fn test_type_mismatch_keeps_position() {
        let err = SamplerError::from(BindError::TypeMismatch {
            position: 2,
            source: DecodeError::mismatch("int", "text"),
        });
        assert!(matches!(
            &err,
            SamplerError::TypeMismatch { position: 2, source: DecodeError::TypeMismatch { .. } }
        ));
        assert!(err.to_string().starts_with("Could not set argument no: 2: "));
        assert_eq!(err.category(), ErrorCategory::Decode);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_retryable_only_for_transient_execution_errors() {
        assert!(SamplerError::from(SessionError::Unavailable("down".into())).is_retryable());
        assert!(SamplerError::from(SessionError::Timeout("read".into())).is_retryable());
        assert!(!SamplerError::from(SessionError::Server("syntax".into())).is_retryable());
        assert!(!SamplerError::Config("bad".into()).is_retryable());
    }
}
