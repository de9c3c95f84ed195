//! Collection, tuple and user-type text handling.
//!
//! Two renderings exist:
//! - *Result form* (`encode_collection`): sets, lists and maps rendered with
//!   their elements in plain text, comma-joined without spaces, e.g.
//!   `[one,two,three]` or `{1:one,2:two}`.
//! - *Literal form* (`to_literal`): CQL literal syntax with quoted text, used
//!   for tuples and user types, e.g. `(10, 'Ten', 10.0)`.
//!
//! Set and map elements are rendered in the order the value holds them,
//! which is the iteration order of whoever produced the value. It is not
//! sorted and not necessarily insertion order.
//!
//! `parse_literal` reads literal form, driven by the declared type.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not},
    error::{ErrorKind, ParseError},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

use super::codec;
use super::error::{DecodeError, DecodeResult};
use super::types::{CqlType, CqlValue};

// ============================================================================
// Result form
// ============================================================================

/// Render a set, list or map in result form.
///
/// Non-collection values fall back to [`codec::encode`].
pub fn encode_collection(value: &CqlValue) -> String {
    match value {
        CqlValue::List(items) => join_wrapped('[', ']', items.iter().map(codec::encode)),
        CqlValue::Set(items) => join_wrapped('{', '}', items.iter().map(codec::encode)),
        CqlValue::Map(entries) => join_wrapped(
            '{',
            '}',
            entries
                .iter()
                .map(|(k, v)| format!("{}:{}", codec::encode(k), codec::encode(v))),
        ),
        other => codec::encode(other),
    }
}

fn join_wrapped<I: Iterator<Item = String>>(open: char, close: char, parts: I) -> String {
    let mut out = String::new();
    out.push(open);
    for (i, part) in parts.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&part);
    }
    out.push(close);
    out
}

// ============================================================================
// Literal form
// ============================================================================

/// Render a value as a CQL literal.
pub fn to_literal(value: &CqlValue) -> String {
    match value {
        CqlValue::Null => "NULL".to_string(),
        CqlValue::Text(s) => quote(s),
        CqlValue::Timestamp(ts) => quote(&codec::format_timestamp(ts)),
        CqlValue::Inet(addr) => quote(&addr.to_string()),
        CqlValue::List(items) => literal_seq("[", "]", items.iter().map(to_literal)),
        CqlValue::Set(items) => literal_seq("{", "}", items.iter().map(to_literal)),
        CqlValue::Map(entries) => literal_seq(
            "{",
            "}",
            entries
                .iter()
                .map(|(k, v)| format!("{}:{}", to_literal(k), to_literal(v))),
        ),
        CqlValue::Tuple(items) => literal_seq("(", ")", items.iter().map(to_literal)),
        CqlValue::Udt(fields) => literal_seq(
            "{",
            "}",
            fields
                .iter()
                .map(|(name, v)| format!("{}:{}", quote_identifier(name), to_literal(v))),
        ),
        scalar => codec::encode(scalar),
    }
}

fn literal_seq<I: Iterator<Item = String>>(open: &str, close: &str, parts: I) -> String {
    let body: Vec<String> = parts.collect();
    format!("{}{}{}", open, body.join(", "), close)
}

/// Single-quote a string, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Identifiers that are not plain lowercase names need double quotes.
fn quote_identifier(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

// ============================================================================
// Literal parsing
// ============================================================================

/// Parse a CQL literal of the declared type.
///
/// Text inside a literal must be single-quoted. Other scalars may be quoted
/// or bare. `NULL` is accepted in any position. Repeated set members and map
/// keys collapse as described on [`CqlValue::new_set`] and
/// [`CqlValue::new_map`].
pub fn parse_literal(input: &str, ty: &CqlType) -> DecodeResult<CqlValue> {
    match literal(ty, input) {
        Ok((rest, value)) if rest.trim_start().is_empty() => Ok(value),
        Ok((rest, _)) => Err(syntax_error(
            input,
            rest.trim_start(),
            "unexpected trailing characters",
        )),
        Err(nom::Err::Error(LiteralError::Decode(e)) | nom::Err::Failure(LiteralError::Decode(e))) => {
            Err(e)
        }
        Err(nom::Err::Error(LiteralError::Syntax(rest)) | nom::Err::Failure(LiteralError::Syntax(rest))) => {
            Err(syntax_error(input, rest, "unexpected input"))
        }
        Err(nom::Err::Incomplete(_)) => Err(DecodeError::literal(input, "incomplete literal")),
    }
}

fn syntax_error(input: &str, rest: &str, reason: &str) -> DecodeError {
    DecodeError::literal(input, format!("{} at offset {}", reason, input.len() - rest.len()))
}

/// Why literal parsing stopped.
#[derive(Debug)]
enum LiteralError<'a> {
    /// Input does not fit the grammar; holds the unparsed remainder.
    Syntax(&'a str),
    /// Input fits the grammar but not the declared type.
    Decode(DecodeError),
}

impl<'a> ParseError<&'a str> for LiteralError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        LiteralError::Syntax(input)
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type LiteralResult<'a, T> = IResult<&'a str, T, LiteralError<'a>>;

/// Type errors are fatal: no alternative branch may recover from them.
fn decode_failure<'a>(err: DecodeError) -> nom::Err<LiteralError<'a>> {
    nom::Err::Failure(LiteralError::Decode(err))
}

/// A scalar token and whether it was quoted.
enum Token {
    Quoted(String),
    Bare(String),
}

fn ws(input: &str) -> LiteralResult<'_, &str> {
    multispace0(input)
}

fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> LiteralResult<'a, char> {
    preceded(multispace0, char(c))
}

fn is_token_char(c: char) -> bool {
    !is_delimiter(c) && !c.is_whitespace()
}

fn bare(input: &str) -> LiteralResult<'_, &str> {
    take_while1(is_token_char)(input)
}

/// A string delimited by `quote`, where a doubled quote is literal.
fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> LiteralResult<'a, String> {
    delimited(
        char(quote),
        fold_many0(
            alt((
                map(pair(char(quote), char(quote)), move |_| quote),
                satisfy(move |c| c != quote),
            )),
            String::new,
            |mut out, c| {
                out.push(c);
                out
            },
        ),
        char(quote),
    )
}

fn token(input: &str) -> LiteralResult<'_, Token> {
    preceded(
        multispace0,
        alt((
            map(quoted('\''), Token::Quoted),
            map(bare, |s: &str| Token::Bare(s.to_string())),
        )),
    )(input)
}

fn null_keyword(input: &str) -> LiteralResult<'_, CqlValue> {
    map(
        terminated(tag_no_case("null"), not(satisfy(is_token_char))),
        |_| CqlValue::Null,
    )(input)
}

/// Opening bracket of a composite literal of type `ty`.
///
/// A separator, a closing bracket or the end of input is a syntax error so an
/// enclosing sequence can end there. Any other character is a type mismatch.
fn open<'a>(bracket: char, ty: &CqlType, input: &'a str) -> LiteralResult<'a, char> {
    let (input, _) = ws(input)?;
    match input.chars().next() {
        Some(c) if c == bracket => Ok((&input[c.len_utf8()..], c)),
        None | Some(',' | ':' | ']' | '}' | ')') => Err(nom::Err::Error(LiteralError::Syntax(input))),
        Some(c) => Err(decode_failure(DecodeError::mismatch(
            ty,
            format!("literal starting with '{}'", c),
        ))),
    }
}

/// `open item (',' item)* close`, allowing an empty body.
fn sequence<'a, T>(
    ty: &CqlType,
    (open_bracket, close_bracket): (char, char),
    item: impl FnMut(&'a str) -> LiteralResult<'a, T>,
    input: &'a str,
) -> LiteralResult<'a, Vec<T>> {
    let (input, _) = open(open_bracket, ty, input)?;
    terminated(separated_list0(symbol(','), item), symbol(close_bracket))(input)
}

fn literal<'a>(ty: &CqlType, input: &'a str) -> LiteralResult<'a, CqlValue> {
    if let CqlType::Custom(name) = ty {
        return Err(decode_failure(DecodeError::UnsupportedType(name.clone())));
    }
    let (input, _) = ws(input)?;
    if let Ok(parsed) = null_keyword(input) {
        return Ok(parsed);
    }

    match ty {
        CqlType::List(elem) => sequence(ty, ('[', ']'), |i: &'a str| literal(elem, i), input)
            .map(|(rest, items)| (rest, CqlValue::List(items))),
        CqlType::Set(elem) => sequence(ty, ('{', '}'), |i: &'a str| literal(elem, i), input)
            .map(|(rest, items)| (rest, CqlValue::new_set(items))),
        CqlType::Map(key, value) => sequence(
            ty,
            ('{', '}'),
            |i: &'a str| {
                separated_pair(
                    |i: &'a str| literal(key, i),
                    symbol(':'),
                    |i: &'a str| literal(value, i),
                )(i)
            },
            input,
        )
        .map(|(rest, entries)| (rest, CqlValue::new_map(entries))),
        CqlType::Tuple(types) => {
            let (input, _) = open('(', ty, input)?;
            let (input, items) = tuple_items(types, input)?;
            let (input, _) = symbol(')')(input)?;
            Ok((input, CqlValue::Tuple(items)))
        }
        CqlType::Udt { fields, .. } => udt(ty, fields, input),
        t if t.is_text_like() => match token(input)? {
            (rest, Token::Quoted(s)) => codec::decode(&s, t)
                .map(|v| (rest, v))
                .map_err(decode_failure),
            (_, Token::Bare(s)) => Err(decode_failure(DecodeError::mismatch(
                t,
                format!("unquoted token {}", s),
            ))),
        },
        scalar => {
            let (rest, (Token::Quoted(s) | Token::Bare(s))) = token(input)?;
            codec::decode_scalar(s.trim(), scalar)
                .map(|v| (rest, v))
                .map_err(decode_failure)
        }
    }
}

/// Exactly one component per declared tuple type, comma separated.
fn tuple_items<'a>(types: &[CqlType], mut input: &'a str) -> LiteralResult<'a, Vec<CqlValue>> {
    let mut items = Vec::with_capacity(types.len());
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            input = symbol(',')(input)?.0;
        }
        let (rest, value) = literal(ty, input)?;
        items.push(value);
        input = rest;
    }
    Ok((input, items))
}

/// User type literal; fields come back in declaration order, missing ones NULL.
fn udt<'a>(ty: &CqlType, fields: &[(String, CqlType)], input: &'a str) -> LiteralResult<'a, CqlValue> {
    let (rest, given) = sequence(ty, ('{', '}'), |i: &'a str| udt_field(fields, i), input)?;

    let mut values = Vec::with_capacity(fields.len());
    for (field, _) in fields {
        let mut matching = given.iter().filter(|(name, _)| name == field);
        let value = matching.next().map(|(_, v)| v.clone()).unwrap_or(CqlValue::Null);
        if matching.next().is_some() {
            return Err(decode_failure(DecodeError::literal(
                input,
                format!("duplicate field {}", field),
            )));
        }
        values.push((field.clone(), value));
    }
    Ok((rest, CqlValue::Udt(values)))
}

/// `name: value`, mapping the name onto a declared field.
///
/// Unquoted names match case-insensitively; double-quoted names match exactly.
fn udt_field<'a>(fields: &[(String, CqlType)], input: &'a str) -> LiteralResult<'a, (String, CqlValue)> {
    let (rest, (name, exact)) = preceded(
        multispace0,
        alt((
            map(quoted('"'), |s: String| (s, true)),
            map(bare, |s: &str| (s.to_string(), false)),
        )),
    )(input)?;

    let (field, field_type) = fields
        .iter()
        .find(|(f, _)| if exact { *f == name } else { f.eq_ignore_ascii_case(&name) })
        .ok_or_else(|| decode_failure(DecodeError::literal(input, format!("unknown field {}", name))))?;

    let (rest, _) = symbol(':')(rest)?;
    let (rest, value) = literal(field_type, rest)?;
    Ok((rest, (field.clone(), value)))
}

fn is_delimiter(c: char) -> bool {
    matches!(c, ',' | ':' | '[' | ']' | '{' | '}' | '(' | ')')
}
