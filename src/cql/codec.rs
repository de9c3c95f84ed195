//! Text codec for CQL values.
//!
//! `decode` turns one textual token into a `CqlValue` of the declared type;
//! `encode` renders a value back to its canonical text. Collections, tuples
//! and user types are delegated to [`super::collection`].

use std::net::{IpAddr, ToSocketAddrs};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use num_bigint::BigInt;
use uuid::Uuid;

use super::collection;
use super::error::{DecodeError, DecodeResult};
use super::types::{CqlType, CqlValue};

/// Primary timestamp format, used for rendering and tried first on input.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";
/// Zone-less timestamp format, interpreted as UTC.
pub const TIMESTAMP_FORMAT_NO_ZONE: &str = "%Y-%m-%d %H:%M:%S";
/// Date-only format, interpreted as midnight UTC.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Decoding
// ============================================================================

/// Decode a textual token into a value of the declared type.
///
/// Text types take the token verbatim. Every other scalar ignores
/// surrounding whitespace. Collections, tuples and user types expect CQL
/// literal syntax, e.g. `['a', 'b']`, `{1: 'one'}`, `(1, 'x')`.
pub fn decode(text: &str, ty: &CqlType) -> DecodeResult<CqlValue> {
    match ty {
        CqlType::Text | CqlType::Varchar => Ok(CqlValue::Text(text.to_string())),
        CqlType::Ascii => {
            if text.is_ascii() {
                Ok(CqlValue::Text(text.to_string()))
            } else {
                Err(DecodeError::mismatch(ty, "non-ascii text"))
            }
        }
        CqlType::List(_)
        | CqlType::Set(_)
        | CqlType::Map(_, _)
        | CqlType::Tuple(_)
        | CqlType::Udt { .. } => collection::parse_literal(text, ty),
        _ => decode_scalar(text.trim(), ty),
    }
}

/// Decode a non-text scalar token.
pub(crate) fn decode_scalar(text: &str, ty: &CqlType) -> DecodeResult<CqlValue> {
    match ty {
        CqlType::Int => parse_number(text, "int").map(CqlValue::Int),
        CqlType::BigInt | CqlType::Counter => parse_number(text, "bigint").map(CqlValue::BigInt),
        CqlType::Double => parse_number(text, "double").map(CqlValue::Double),
        CqlType::Float => parse_number(text, "float").map(CqlValue::Float),
        CqlType::Decimal => BigDecimal::from_str(text)
            .map(CqlValue::Decimal)
            .map_err(|_| numeric_error(text, "decimal")),
        CqlType::VarInt => BigInt::from_str(text)
            .map(CqlValue::VarInt)
            .map_err(|_| numeric_error(text, "varint")),
        CqlType::Boolean => {
            if text.eq_ignore_ascii_case("true") {
                Ok(CqlValue::Boolean(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(CqlValue::Boolean(false))
            } else {
                Err(DecodeError::InvalidBoolean(text.to_string()))
            }
        }
        CqlType::Blob => parse_blob(text).map(CqlValue::Blob),
        CqlType::Inet => parse_inet(text).map(CqlValue::Inet),
        CqlType::Timestamp => parse_timestamp(text).map(CqlValue::Timestamp),
        CqlType::Uuid => parse_uuid(text).map(CqlValue::Uuid),
        CqlType::TimeUuid => {
            let uuid = parse_uuid(text)?;
            if uuid.get_version_num() != 1 {
                return Err(DecodeError::InvalidUuid(format!("{} is not a time-based uuid", text)));
            }
            Ok(CqlValue::Uuid(uuid))
        }
        CqlType::Text | CqlType::Varchar | CqlType::Ascii => Ok(CqlValue::Text(text.to_string())),
        CqlType::Custom(name) => Err(DecodeError::UnsupportedType(name.clone())),
        CqlType::List(_)
        | CqlType::Set(_)
        | CqlType::Map(_, _)
        | CqlType::Tuple(_)
        | CqlType::Udt { .. } => collection::parse_literal(text, ty),
    }
}

fn parse_number<T: FromStr>(text: &str, target: &'static str) -> DecodeResult<T> {
    text.parse::<T>().map_err(|_| numeric_error(text, target))
}

fn numeric_error(text: &str, target: &'static str) -> DecodeError {
    DecodeError::NumericFormat {
        value: text.to_string(),
        target,
    }
}

/// Parse a `0x`-prefixed hex literal into bytes.
pub fn parse_blob(text: &str) -> DecodeResult<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| DecodeError::InvalidHex("blob must start with 0x".to_string()))?;
    if digits.len() % 2 != 0 {
        return Err(DecodeError::InvalidHex(format!(
            "odd number of hex digits in \"{}\"",
            text
        )));
    }
    hex::decode(digits).map_err(|e| DecodeError::InvalidHex(format!("\"{}\": {}", text, e)))
}

/// Parse a timestamp in one of the accepted formats.
///
/// Formats are tried by actual parse, zoned first. Zone-less inputs are UTC.
pub fn parse_timestamp(text: &str) -> DecodeResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_NO_ZONE) {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(DecodeError::InvalidDate(text.to_string()))
}

/// Parse an address literal or resolve a host name.
///
/// A leading `/`, as found in driver-rendered addresses, is ignored.
pub fn parse_inet(text: &str) -> DecodeResult<IpAddr> {
    let host = text.strip_prefix('/').unwrap_or(text);
    if host.is_empty() {
        return Err(DecodeError::InvalidInet(text.to_string()));
    }
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }
    (host, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|sock| sock.ip())
        .ok_or_else(|| DecodeError::InvalidInet(text.to_string()))
}

/// Parse a hyphenated 8-4-4-4-12 uuid.
pub fn parse_uuid(text: &str) -> DecodeResult<Uuid> {
    // Only the hyphenated form is 36 characters long.
    if text.len() != 36 {
        return Err(DecodeError::InvalidUuid(text.to_string()));
    }
    Uuid::parse_str(text).map_err(|_| DecodeError::InvalidUuid(text.to_string()))
}

// ============================================================================
// Encoding
// ============================================================================

/// Render a value as text.
///
/// Blobs render as `0x` + lowercase hex, timestamps with [`TIMESTAMP_FORMAT`]
/// in UTC, sets and maps as `{..}`, lists as `[..]`, tuples as `(..)`.
pub fn encode(value: &CqlValue) -> String {
    match value {
        CqlValue::Null => "NULL".to_string(),
        CqlValue::Int(v) => v.to_string(),
        CqlValue::BigInt(v) => v.to_string(),
        CqlValue::Boolean(v) => v.to_string(),
        CqlValue::Blob(v) => format_blob(v),
        CqlValue::Decimal(v) => v.to_string(),
        CqlValue::Double(v) => format!("{:?}", v),
        CqlValue::Float(v) => format!("{:?}", v),
        CqlValue::Inet(v) => v.to_string(),
        CqlValue::Timestamp(v) => format_timestamp(v),
        CqlValue::Text(v) => v.clone(),
        CqlValue::Uuid(v) => v.to_string(),
        CqlValue::VarInt(v) => v.to_string(),
        CqlValue::List(_) | CqlValue::Set(_) | CqlValue::Map(_) => collection::encode_collection(value),
        CqlValue::Tuple(_) | CqlValue::Udt(_) => collection::to_literal(value),
    }
}

/// Render a value after checking it against the declared type.
pub fn encode_typed(value: &CqlValue, ty: &CqlType) -> DecodeResult<String> {
    if let CqlType::Custom(name) = ty {
        return Err(DecodeError::UnsupportedType(name.clone()));
    }
    if !value.matches(ty) {
        return Err(DecodeError::mismatch(ty, value.kind_name()));
    }
    Ok(encode(value))
}

/// Render bytes as `0x` followed by lowercase hex.
pub fn format_blob(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Render a timestamp in the primary format.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
