//! CQL value marshalling and statement handling.
//!
//! This module converts between the textual form used by test scripts and
//! typed CQL values, and keeps prepared statements cached per connection.
//!
//! Architecture:
//! - `types`: CQL type system and typed values
//! - `codec`: scalar text decode/encode
//! - `collection`: set/list/map rendering and composite literal parsing
//! - `arguments`: argument line splitting and positional binding
//! - `statement`: statements, consistency levels and the LRU statement cache
//! - `registry`: connection → statement cache map

pub mod types;
pub mod codec;
pub mod collection;
pub mod arguments;
pub mod statement;
pub mod registry;
pub mod error;


pub use error::{BindError, DecodeError, DecodeResult};
pub use registry::StatementCacheRegistry;
pub use statement::{
    BatchStatement, BoundStatement, Consistency, PreparedStatement, SharedColumns, SimpleStatement,
    Statement, StatementCache,
};
pub use types::{ColumnDescriptor, CqlType, CqlValue};
