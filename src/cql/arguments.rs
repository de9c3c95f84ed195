//! Argument list handling.
//!
//! Query arguments arrive as a single comma-delimited line in spreadsheet
//! CSV style: fields containing commas are wrapped in double quotes, and a
//! doubled quote inside a quoted field is a literal quote. One field is
//! bound per statement variable, in declaration order.

use crate::error::{Result, SamplerError};

use super::codec;
use super::error::DecodeError;
use super::statement::BoundStatement;
use super::types::CqlValue;

/// Split an argument line into tokens.
///
/// A blank line yields no tokens.
pub fn split_arguments(input: &str) -> std::result::Result<Vec<String>, DecodeError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut record = csv::StringRecord::new();
    let tokens = match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        Ok(false) => Vec::new(),
        Err(e) => return Err(DecodeError::literal(input, e.to_string())),
    };

    match reader.read_record(&mut record) {
        Ok(false) => Ok(tokens),
        Ok(true) => Err(DecodeError::literal(
            input,
            "arguments must be on a single line (quote fields containing line breaks)",
        )),
        Err(e) => Err(DecodeError::literal(input, e.to_string())),
    }
}

/// Decode every argument against the statement's variables and bind them.
///
/// All arguments are decoded before any is bound, so a failure leaves the
/// statement untouched.
pub fn bind_arguments(statement: &mut BoundStatement, arguments: &str) -> Result<()> {
    let tokens = split_arguments(arguments)?;
    let variables = statement.variables();

    if tokens.len() != variables.len() {
        return Err(SamplerError::ArgumentCount {
            expected: variables.len(),
            actual: tokens.len(),
        });
    }

    let mut values: Vec<CqlValue> = Vec::with_capacity(tokens.len());
    for (i, (token, column)) in tokens.iter().zip(variables.iter()).enumerate() {
        let value = codec::decode(token, &column.cql_type).map_err(|source| {
            SamplerError::Argument {
                position: i + 1,
                argument: token.clone(),
                source,
            }
        })?;
        values.push(value);
    }

    for (i, value) in values.into_iter().enumerate() {
        statement.set(i, value)?;
    }
    Ok(())
}
