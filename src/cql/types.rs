//! CQL type descriptors and typed values.
//!
//! `CqlType` is the declared type of a column or bind variable as reported by
//! statement metadata. `CqlValue` is the typed value carried in bound
//! statements and result rows. Every `CqlValue` variant corresponds to one or
//! more `CqlType`s; `CqlValue::matches` is the single place that relation is
//! spelled out.

use std::fmt;
use std::net::IpAddr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use num_bigint::BigInt;
use uuid::Uuid;

use super::error::{DecodeError, DecodeResult};

// ============================================================================
// Declared types
// ============================================================================

/// Declared CQL type, parameterised for collections, tuples and user types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CqlType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Inet,
    Int,
    Text,
    Timestamp,
    Uuid,
    TimeUuid,
    Varchar,
    VarInt,
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Tuple(Vec<CqlType>),
    /// User-defined type with its fields in declaration order.
    Udt {
        name: String,
        fields: Vec<(String, CqlType)>,
    },
    /// Any type name the codec has no mapping for.
    Custom(String),
}

impl CqlType {
    pub fn list(element: CqlType) -> Self {
        CqlType::List(Box::new(element))
    }

    pub fn set(element: CqlType) -> Self {
        CqlType::Set(Box::new(element))
    }

    pub fn map(key: CqlType, value: CqlType) -> Self {
        CqlType::Map(Box::new(key), Box::new(value))
    }

    /// Build a user type from `(field, type)` pairs.
    pub fn udt<N: Into<String>>(name: &str, fields: Vec<(N, CqlType)>) -> Self {
        CqlType::Udt {
            name: name.to_string(),
            fields: fields.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// Check if this is a set, list or map.
    pub fn is_collection(&self) -> bool {
        matches!(self, CqlType::List(_) | CqlType::Set(_) | CqlType::Map(_, _))
    }

    /// Check if this is a tuple or user type.
    pub fn is_composite(&self) -> bool {
        matches!(self, CqlType::Tuple(_) | CqlType::Udt { .. })
    }

    /// Check if this is a text type.
    pub fn is_text_like(&self) -> bool {
        matches!(self, CqlType::Text | CqlType::Varchar | CqlType::Ascii)
    }

    /// Type arguments of a collection (element, or key and value).
    pub fn type_arguments(&self) -> Vec<&CqlType> {
        match self {
            CqlType::List(e) | CqlType::Set(e) => vec![e.as_ref()],
            CqlType::Map(k, v) => vec![k.as_ref(), v.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Parse a CQL type name such as `int`, `list<text>` or
    /// `frozen<map<int, text>>`.
    ///
    /// `frozen<..>` is transparent. Unknown simple names yield
    /// `CqlType::Custom`. User types cannot be described by name alone and
    /// come back as `Custom` too; build them with [`CqlType::udt`].
    pub fn parse(input: &str) -> DecodeResult<Self> {
        match terminated(type_expr, multispace0)(input) {
            Ok(("", expr)) => expr.resolve(),
            Ok((rest, _)) => Err(DecodeError::literal(
                input,
                format!("trailing characters after type: {:?}", rest),
            )),
            Err(_) => Err(DecodeError::literal(input, "expected a type name")),
        }
    }

    fn from_simple_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "ascii" => CqlType::Ascii,
            "bigint" => CqlType::BigInt,
            "blob" => CqlType::Blob,
            "boolean" => CqlType::Boolean,
            "counter" => CqlType::Counter,
            "decimal" => CqlType::Decimal,
            "double" => CqlType::Double,
            "float" => CqlType::Float,
            "inet" => CqlType::Inet,
            "int" => CqlType::Int,
            "text" => CqlType::Text,
            "timestamp" => CqlType::Timestamp,
            "uuid" => CqlType::Uuid,
            "timeuuid" => CqlType::TimeUuid,
            "varchar" => CqlType::Varchar,
            "varint" => CqlType::VarInt,
            _ => CqlType::Custom(name.to_string()),
        }
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlType::Ascii => f.write_str("ascii"),
            CqlType::BigInt => f.write_str("bigint"),
            CqlType::Blob => f.write_str("blob"),
            CqlType::Boolean => f.write_str("boolean"),
            CqlType::Counter => f.write_str("counter"),
            CqlType::Decimal => f.write_str("decimal"),
            CqlType::Double => f.write_str("double"),
            CqlType::Float => f.write_str("float"),
            CqlType::Inet => f.write_str("inet"),
            CqlType::Int => f.write_str("int"),
            CqlType::Text => f.write_str("text"),
            CqlType::Timestamp => f.write_str("timestamp"),
            CqlType::Uuid => f.write_str("uuid"),
            CqlType::TimeUuid => f.write_str("timeuuid"),
            CqlType::Varchar => f.write_str("varchar"),
            CqlType::VarInt => f.write_str("varint"),
            CqlType::List(e) => write!(f, "list<{}>", e),
            CqlType::Set(e) => write!(f, "set<{}>", e),
            CqlType::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            CqlType::Tuple(elems) => {
                f.write_str("tuple<")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str(">")
            }
            CqlType::Udt { name, .. } => f.write_str(name),
            CqlType::Custom(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// Type name grammar
// ============================================================================

/// A parsed type name before it is checked against the known types.
struct TypeExpr<'a> {
    name: &'a str,
    args: Option<Vec<TypeExpr<'a>>>,
}

impl TypeExpr<'_> {
    fn resolve(self) -> DecodeResult<CqlType> {
        let Some(args) = self.args else {
            return Ok(CqlType::from_simple_name(self.name));
        };
        let mut args = args
            .into_iter()
            .map(TypeExpr::resolve)
            .collect::<DecodeResult<Vec<_>>>()?;

        let name = self.name.to_ascii_lowercase();
        let arity = match name.as_str() {
            "frozen" | "list" | "set" => Some(1),
            "map" => Some(2),
            _ => None,
        };
        if let Some(n) = arity {
            if args.len() != n {
                return Err(DecodeError::literal(
                    self.name,
                    format!("{} takes {} type argument(s), got {}", name, n, args.len()),
                ));
            }
        }

        match name.as_str() {
            "frozen" => Ok(args.remove(0)),
            "list" => Ok(CqlType::list(args.remove(0))),
            "set" => Ok(CqlType::set(args.remove(0))),
            "map" => {
                let value = args.remove(1);
                Ok(CqlType::map(args.remove(0), value))
            }
            "tuple" => Ok(CqlType::Tuple(args)),
            _ => Err(DecodeError::UnsupportedType(self.name.to_string())),
        }
    }
}

/// Type identifier, optionally keyspace-qualified or double-quoted.
fn type_name(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.' || c == '"'),
    )(input)
}

/// `<T, ...>` following a parameterised type name.
fn type_arguments(input: &str) -> IResult<&str, Vec<TypeExpr<'_>>> {
    delimited(
        preceded(multispace0, char('<')),
        separated_list1(preceded(multispace0, char(',')), type_expr),
        preceded(multispace0, char('>')),
    )(input)
}

fn type_expr(input: &str) -> IResult<&str, TypeExpr<'_>> {
    map(pair(type_name, opt(type_arguments)), |(name, args)| TypeExpr {
        name,
        args,
    })(input)
}

// ============================================================================
// Typed values
// ============================================================================

/// A CQL value with its runtime type.
///
/// Equality treats `Set` and `Map` as unordered: two sets are equal when they
/// hold the same members, two maps when they hold the same entries.
#[derive(Debug, Clone)]
pub enum CqlValue {
    Null,
    Int(i32),
    BigInt(i64),
    Boolean(bool),
    Blob(Vec<u8>),
    Decimal(BigDecimal),
    Double(f64),
    Float(f32),
    Inet(IpAddr),
    Timestamp(DateTime<Utc>),
    Text(String),
    Uuid(Uuid),
    VarInt(BigInt),
    Tuple(Vec<CqlValue>),
    /// User type fields in declaration order.
    Udt(Vec<(String, CqlValue)>),
    /// Elements in the iteration order they were produced in; not sorted.
    Set(Vec<CqlValue>),
    List(Vec<CqlValue>),
    /// Entries in the iteration order they were produced in; not sorted.
    Map(Vec<(CqlValue, CqlValue)>),
}

impl PartialEq for CqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Inet(a), Self::Inet(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::VarInt(a), Self::VarInt(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) | (Self::List(a), Self::List(b)) => a == b,
            (Self::Udt(a), Self::Udt(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => same_members(a, b),
            (Self::Map(a), Self::Map(b)) => same_members(a, b),
            _ => false,
        }
    }
}

/// Unordered comparison of two duplicate-free collections.
fn same_members<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

impl CqlValue {
    /// Build a set, dropping repeated members. The first occurrence is kept.
    pub fn new_set(items: Vec<CqlValue>) -> Self {
        let mut members: Vec<CqlValue> = Vec::with_capacity(items.len());
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        CqlValue::Set(members)
    }

    /// Build a map. A repeated key keeps its first position and takes the
    /// last value given for it.
    pub fn new_map(entries: Vec<(CqlValue, CqlValue)>) -> Self {
        let mut out: Vec<(CqlValue, CqlValue)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match out.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        CqlValue::Map(out)
    }

    /// Check if this value is NULL
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }

    /// Short name of the runtime type, used in mismatch messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CqlValue::Null => "null",
            CqlValue::Int(_) => "int",
            CqlValue::BigInt(_) => "bigint",
            CqlValue::Boolean(_) => "boolean",
            CqlValue::Blob(_) => "blob",
            CqlValue::Decimal(_) => "decimal",
            CqlValue::Double(_) => "double",
            CqlValue::Float(_) => "float",
            CqlValue::Inet(_) => "inet",
            CqlValue::Timestamp(_) => "timestamp",
            CqlValue::Text(_) => "text",
            CqlValue::Uuid(_) => "uuid",
            CqlValue::VarInt(_) => "varint",
            CqlValue::Tuple(_) => "tuple",
            CqlValue::Udt(_) => "udt",
            CqlValue::Set(_) => "set",
            CqlValue::List(_) => "list",
            CqlValue::Map(_) => "map",
        }
    }

    /// Check whether this value may be stored under the declared type.
    ///
    /// NULL fits every supported type. Nothing fits `CqlType::Custom`.
    pub fn matches(&self, ty: &CqlType) -> bool {
        if let CqlType::Custom(_) = ty {
            return false;
        }
        match (self, ty) {
            (CqlValue::Null, _) => true,
            (CqlValue::Int(_), CqlType::Int) => true,
            (CqlValue::BigInt(_), CqlType::BigInt | CqlType::Counter) => true,
            (CqlValue::Boolean(_), CqlType::Boolean) => true,
            (CqlValue::Blob(_), CqlType::Blob) => true,
            (CqlValue::Decimal(_), CqlType::Decimal) => true,
            (CqlValue::Double(_), CqlType::Double) => true,
            (CqlValue::Float(_), CqlType::Float) => true,
            (CqlValue::Inet(_), CqlType::Inet) => true,
            (CqlValue::Timestamp(_), CqlType::Timestamp) => true,
            (CqlValue::Text(_), t) if t.is_text_like() => true,
            (CqlValue::Uuid(_), CqlType::Uuid | CqlType::TimeUuid) => true,
            (CqlValue::VarInt(_), CqlType::VarInt) => true,
            (CqlValue::List(items), CqlType::List(e)) | (CqlValue::Set(items), CqlType::Set(e)) => {
                items.iter().all(|v| v.matches(e))
            }
            (CqlValue::Map(entries), CqlType::Map(k, v)) => entries
                .iter()
                .all(|(key, value)| key.matches(k) && value.matches(v)),
            (CqlValue::Tuple(items), CqlType::Tuple(types)) => {
                items.len() == types.len()
                    && items.iter().zip(types).all(|(v, t)| v.matches(t))
            }
            (CqlValue::Udt(values), CqlType::Udt { fields, .. }) => {
                values.iter().all(|(name, value)| {
                    fields
                        .iter()
                        .find(|(field, _)| field == name)
                        .map(|(_, t)| value.matches(t))
                        .unwrap_or(false)
                })
            }
            _ => false,
        }
    }

    /// Try to convert this value to an i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            CqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to convert this value to an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CqlValue::BigInt(i) => Some(*i),
            CqlValue::Int(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to borrow this value as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to borrow this value as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }
}

// ============================================================================
// Column metadata
// ============================================================================

/// Name and declared type of a result column or bind variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub cql_type: CqlType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self {
            name: name.into(),
            cql_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_classification() {
        assert!(CqlType::list(CqlType::Text).is_collection());
        assert!(CqlType::map(CqlType::Int, CqlType::Text).is_collection());
        assert!(!CqlType::Tuple(vec![CqlType::Int]).is_collection());
        assert!(CqlType::Tuple(vec![CqlType::Int]).is_composite());

        assert!(CqlType::Varchar.is_text_like());
        assert!(CqlType::Ascii.is_text_like());
        assert!(!CqlType::Blob.is_text_like());
    }

    #[test]
    fn test_parse_simple_names() {
        assert_eq!(CqlType::parse("int").unwrap(), CqlType::Int);
        assert_eq!(CqlType::parse("  BIGINT ").unwrap(), CqlType::BigInt);
        assert_eq!(CqlType::parse("timeuuid").unwrap(), CqlType::TimeUuid);
        assert_eq!(
            CqlType::parse("duration").unwrap(),
            CqlType::Custom("duration".to_string())
        );
    }

    #[test]
    fn test_parse_parameterised_names() {
        assert_eq!(
            CqlType::parse("list<text>").unwrap(),
            CqlType::list(CqlType::Text)
        );
        assert_eq!(
            CqlType::parse("frozen<map<int, text>>").unwrap(),
            CqlType::map(CqlType::Int, CqlType::Text)
        );
        assert_eq!(
            CqlType::parse("frozen<tuple<int,text,float>>").unwrap(),
            CqlType::Tuple(vec![CqlType::Int, CqlType::Text, CqlType::Float])
        );
        assert_eq!(
            CqlType::parse("list<frozen<set<uuid>>>").unwrap(),
            CqlType::list(CqlType::set(CqlType::Uuid))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!(CqlType::parse("list<text").is_err());
        assert!(CqlType::parse("map<int>").is_err());
        assert!(CqlType::parse("list<text> extra").is_err());
        assert!(matches!(
            CqlType::parse("vector<float, 3>"),
            Err(DecodeError::UnsupportedType(_)) | Err(DecodeError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn test_type_display_round_trips_through_parse() {
        let ty = CqlType::map(CqlType::Text, CqlType::list(CqlType::Double));
        assert_eq!(ty.to_string(), "map<text, list<double>>");
        assert_eq!(CqlType::parse(&ty.to_string()).unwrap(), ty);
    }

    #[test]
    fn test_value_matches_declared_type() {
        assert!(CqlValue::Int(1).matches(&CqlType::Int));
        assert!(!CqlValue::Int(1).matches(&CqlType::BigInt));
        assert!(CqlValue::BigInt(1).matches(&CqlType::Counter));
        assert!(CqlValue::Text("a".into()).matches(&CqlType::Ascii));
        assert!(CqlValue::Null.matches(&CqlType::Blob));
        assert!(!CqlValue::Null.matches(&CqlType::Custom("x".into())));

        let list = CqlValue::List(vec![CqlValue::Int(1), CqlValue::Text("x".into())]);
        assert!(!list.matches(&CqlType::list(CqlType::Int)));

        let tuple = CqlValue::Tuple(vec![CqlValue::Int(1)]);
        assert!(!tuple.matches(&CqlType::Tuple(vec![CqlType::Int, CqlType::Text])));

        let udt_type = CqlType::udt("nums_t", vec![("t_int", CqlType::Int)]);
        assert!(CqlValue::Udt(vec![("t_int".into(), CqlValue::Int(3))]).matches(&udt_type));
        assert!(!CqlValue::Udt(vec![("other".into(), CqlValue::Int(3))]).matches(&udt_type));
    }

    #[test]
    fn test_value_conversions() {
        let val = CqlValue::Int(42);
        assert_eq!(val.as_i32(), Some(42));
        assert_eq!(val.as_i64(), Some(42));
        assert_eq!(val.as_str(), None);
        assert_eq!(CqlValue::Blob(vec![1]).as_bytes(), Some(&[1u8][..]));
    }

    #[test]
    fn test_set_and_map_constructors_collapse_repeats() {
        let set = CqlValue::new_set(vec![CqlValue::Int(1), CqlValue::Int(2), CqlValue::Int(1)]);
        assert!(matches!(&set, CqlValue::Set(items) if items.len() == 2));

        let map = CqlValue::new_map(vec![
            (CqlValue::Int(1), CqlValue::Text("a".into())),
            (CqlValue::Int(2), CqlValue::Text("b".into())),
            (CqlValue::Int(1), CqlValue::Text("c".into())),
        ]);
        match map {
            CqlValue::Map(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0], (CqlValue::Int(1), CqlValue::Text("c".into())));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_set_and_map_equality_ignores_order() {
        let a = CqlValue::Set(vec![CqlValue::Int(1), CqlValue::Int(2)]);
        let b = CqlValue::Set(vec![CqlValue::Int(2), CqlValue::Int(1)]);
        assert_eq!(a, b);
        assert_ne!(a, CqlValue::Set(vec![CqlValue::Int(1)]));
        assert_ne!(a, CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2)]));

        let m1 = CqlValue::Map(vec![
            (CqlValue::Int(1), CqlValue::Int(10)),
            (CqlValue::Int(2), CqlValue::Int(20)),
        ]);
        let m2 = CqlValue::Map(vec![
            (CqlValue::Int(2), CqlValue::Int(20)),
            (CqlValue::Int(1), CqlValue::Int(10)),
        ]);
        assert_eq!(m1, m2);

        let lists_differ = CqlValue::List(vec![CqlValue::Int(2), CqlValue::Int(1)]);
        assert_ne!(lists_differ, CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2)]));
    }
}
