//! Error types for CQL value conversion and statement binding.

use std::fmt;

/// Result type for codec operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while converting between text and typed CQL values.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Numeric literal could not be parsed for the target type.
    NumericFormat { value: String, target: &'static str },

    /// Boolean literal was neither `true` nor `false`.
    InvalidBoolean(String),

    /// Blob literal without `0x` prefix, with odd length or a non-hex digit.
    InvalidHex(String),

    /// Timestamp literal matched none of the accepted formats.
    InvalidDate(String),

    /// Address literal could not be parsed or resolved.
    InvalidInet(String),

    /// UUID literal not in hyphenated 8-4-4-4-12 form.
    InvalidUuid(String),

    /// Malformed composite literal (collection, tuple or user type).
    InvalidLiteral { input: String, reason: String },

    /// Value does not fit the declared type.
    TypeMismatch { expected: String, found: String },

    /// Declared type is outside the supported set.
    UnsupportedType(String),
}

impl DecodeError {
    pub(crate) fn literal(input: &str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidLiteral {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: impl ToString, found: impl Into<String>) -> Self {
        DecodeError::TypeMismatch {
            expected: expected.to_string(),
            found: found.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NumericFormat { value, target } => {
                write!(f, "Invalid {} literal: \"{}\"", target, value)
            }
            DecodeError::InvalidBoolean(v) => write!(f, "Invalid boolean literal: \"{}\"", v),
            DecodeError::InvalidHex(msg) => write!(f, "Invalid blob literal: {}", msg),
            DecodeError::InvalidDate(v) => write!(f, "Unparsable timestamp: \"{}\"", v),
            DecodeError::InvalidInet(v) => write!(f, "Invalid inet address: \"{}\"", v),
            DecodeError::InvalidUuid(v) => write!(f, "Invalid uuid: \"{}\"", v),
            DecodeError::InvalidLiteral { input, reason } => {
                write!(f, "Invalid literal \"{}\": {}", input, reason)
            }
            DecodeError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            DecodeError::UnsupportedType(name) => write!(f, "Unsupported Type: {}", name),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors raised while placing values into a bound statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    /// Bind position does not exist in the statement (1-indexed).
    MissingParameter { position: usize },

    /// Value type differs from the declared bind variable type (1-indexed).
    TypeMismatch { position: usize, source: DecodeError },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::MissingParameter { position } => write!(
                f,
                "Could not set argument no: {} - missing parameter marker?",
                position
            ),
            BindError::TypeMismatch { position, source } => {
                write!(f, "Could not set argument no: {} - {}", position, source)
            }
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BindError::TypeMismatch { source, .. } => Some(source),
            _ => None,
        }
    }
}
