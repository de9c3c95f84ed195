//! Query results and their textual serialization.
//!
//! A `ResultTable` is produced once per execution and consumed once by the
//! `ResultSerializer`, which writes:
//! - a tab separated block with a header line
//! - optionally, the rows as a list of column→value maps under a result variable
//! - optionally, per-row positional variables `name_j` plus a `name_#` count

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::cql::codec;
use crate::cql::error::{DecodeError, DecodeResult};
use crate::cql::types::{ColumnDescriptor, CqlValue};

// ============================================================================
// Result Table
// ============================================================================

/// A row of column values, positionally aligned with the table's columns.
/// Uses SmallVec to keep rows of up to 16 columns inline.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub values: SmallVec<[CqlValue; 16]>,
}

impl Row {
    pub fn new(values: impl IntoIterator<Item = CqlValue>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column metadata plus rows, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ResultTable {
    columns: Arc<Vec<ColumnDescriptor>>,
    rows: Vec<Row>,
}

impl ResultTable {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns: Arc::new(columns),
            rows: Vec::new(),
        }
    }

    /// A result with no columns, as returned by writes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a row; its width must equal the column count.
    pub fn push_row(&mut self, row: Row) -> DecodeResult<()> {
        if row.len() != self.columns.len() {
            return Err(DecodeError::mismatch(
                format!("row of {} columns", self.columns.len()),
                format!("row of {} values", row.len()),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn with_row(mut self, values: impl IntoIterator<Item = CqlValue>) -> DecodeResult<Self> {
        self.push_row(Row::new(values))?;
        Ok(self)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// ============================================================================
// Variables
// ============================================================================

/// A row captured under the result variable: column name → value.
pub type RowMap = HashMap<String, CqlValue>;

/// The variable namespace of the surrounding test thread.
///
/// Holds string variables plus object variables (lists of row maps).
#[derive(Debug, Default, Clone)]
pub struct Variables {
    values: HashMap<String, String>,
    objects: HashMap<String, Vec<RowMap>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_object(&self, name: &str) -> Option<&[RowMap]> {
        self.objects.get(name).map(Vec::as_slice)
    }

    pub fn put_object(&mut self, name: impl Into<String>, rows: Vec<RowMap>) {
        self.objects.insert(name.into(), rows);
    }

    /// Number of string variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.objects.is_empty()
    }
}

// ============================================================================
// Serializer
// ============================================================================

pub struct ResultSerializer {
    null_marker: String,
    /// Positional variable names; empty entries skip their column.
    variable_names: Vec<String>,
    result_variable: Option<String>,
}

impl ResultSerializer {
    pub fn new(null_marker: impl Into<String>) -> Self {
        Self {
            null_marker: null_marker.into(),
            variable_names: Vec::new(),
            result_variable: None,
        }
    }

    /// Set the positional variable names from a comma separated list.
    pub fn variable_names(mut self, names: &str) -> Self {
        self.variable_names = if names.trim().is_empty() {
            Vec::new()
        } else {
            names.split(',').map(|n| n.trim().to_string()).collect()
        };
        self
    }

    /// Set the variable that receives the rows as a list of maps.
    pub fn result_variable(mut self, name: &str) -> Self {
        let name = name.trim();
        self.result_variable = (!name.is_empty()).then(|| name.to_string());
        self
    }

    /// Render one cell; NULL becomes the null marker.
    fn render(&self, value: &CqlValue, column: &ColumnDescriptor) -> DecodeResult<String> {
        if value.is_null() {
            return Ok(self.null_marker.clone());
        }
        codec::encode_typed(value, &column.cql_type)
    }

    /// Serialize `table`, updating `vars`, and return the text block.
    ///
    /// Variables are written only after every cell rendered, so a failure
    /// leaves `vars` untouched.
    pub fn serialize(&self, table: ResultTable, vars: &mut Variables) -> DecodeResult<String> {
        let columns = Arc::clone(&table.columns);
        let mut out = String::new();
        let mut positional: Vec<(String, String)> = Vec::new();
        let mut row_maps: Vec<RowMap> = Vec::new();

        let header: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        out.push_str(&header.join("\t"));
        out.push('\n');

        let mut j = 0;
        for row in table.rows {
            j += 1;
            let mut row_map = RowMap::new();
            for (i, (value, column)) in row.values.into_iter().zip(columns.iter()).enumerate() {
                let text = self.render(&value, column)?;
                out.push_str(&text);
                out.push(if i + 1 == columns.len() { '\n' } else { '\t' });

                if let Some(name) = self.variable_names.get(i).filter(|n| !n.is_empty()) {
                    positional.push((format!("{}_{}", name, j), text));
                }
                if self.result_variable.is_some() {
                    row_map.insert(column.name.clone(), value);
                }
            }
            if self.result_variable.is_some() {
                row_maps.push(row_map);
            }
        }

        for (name, value) in positional {
            vars.put(name, value);
        }
        if let Some(rv) = &self.result_variable {
            vars.put_object(rv.clone(), row_maps);
        }
        self.prune_stale(j, vars);

        Ok(out)
    }

    /// Remove `name_n` left from a longer previous result and record the new
    /// row count under `name_#`.
    fn prune_stale(&self, rows: usize, vars: &mut Variables) {
        for name in self.variable_names.iter().filter(|n| !n.is_empty()) {
            let count_key = format!("{}_#", name);
            let previous = vars
                .get(&count_key)
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(0);
            for n in rows + 1..=previous {
                vars.remove(&format!("{}_{}", name, n));
            }
            vars.put(count_key, rows.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::types::CqlType;

    fn table(rows: usize) -> ResultTable {
        let mut table = ResultTable::new(vec![
            ColumnDescriptor::new("id", CqlType::Int),
            ColumnDescriptor::new("name", CqlType::Text),
        ]);
        for i in 1..=rows {
            table
                .push_row(Row::new([CqlValue::Int(i as i32), CqlValue::Text(format!("n{}", i))]))
                .unwrap();
        }
        table
    }

    #[test]
    fn test_header_and_rows() {
        let mut vars = Variables::new();
        let out = ResultSerializer::new("]NULL[")
            .serialize(table(2), &mut vars)
            .unwrap();
        assert_eq!(out, "id\tname\n1\tn1\n2\tn2\n");
        assert!(vars.is_empty());
    }

    #[test]
    fn test_null_marker_in_text_and_variables() {
        let t = ResultTable::new(vec![
            ColumnDescriptor::new("a", CqlType::Int),
            ColumnDescriptor::new("b", CqlType::Text),
        ])
        .with_row([CqlValue::Null, CqlValue::Text(String::new())])
        .unwrap();

        let mut vars = Variables::new();
        let out = ResultSerializer::new("]NULL[")
            .variable_names("a,b")
            .result_variable("rows")
            .serialize(t, &mut vars)
            .unwrap();

        assert_eq!(out, "a\tb\n]NULL[\t\n");
        assert_eq!(vars.get("a_1"), Some("]NULL["));
        assert_eq!(vars.get("b_1"), Some(""));
        let rows = vars.get_object("rows").unwrap();
        assert_eq!(rows[0]["a"], CqlValue::Null);
    }

    #[test]
    fn test_positional_variables_skip_empty_names() {
        let mut vars = Variables::new();
        ResultSerializer::new("]NULL[")
            .variable_names(" , name ")
            .serialize(table(2), &mut vars)
            .unwrap();

        assert_eq!(vars.get("name_1"), Some("n1"));
        assert_eq!(vars.get("name_2"), Some("n2"));
        assert_eq!(vars.get("name_#"), Some("2"));
        assert!(!vars.contains("_1"));
        assert!(!vars.contains("_#"));
    }

    #[test]
    fn test_stale_variables_are_pruned() {
        let serializer = ResultSerializer::new("]NULL[").variable_names("rv");
        let mut vars = Variables::new();

        serializer.serialize(table(5), &mut vars).unwrap();
        assert_eq!(vars.get("rv_5"), Some("5"));
        assert_eq!(vars.get("rv_#"), Some("5"));

        serializer.serialize(table(2), &mut vars).unwrap();
        assert_eq!(vars.get("rv_1"), Some("1"));
        assert_eq!(vars.get("rv_2"), Some("2"));
        for n in 3..=5 {
            assert!(!vars.contains(&format!("rv_{}", n)));
        }
        assert_eq!(vars.get("rv_#"), Some("2"));

        serializer.serialize(table(0), &mut vars).unwrap();
        assert!(!vars.contains("rv_1"));
        assert_eq!(vars.get("rv_#"), Some("0"));
    }

    #[test]
    fn test_result_variable_holds_row_maps() {
        let mut vars = Variables::new();
        ResultSerializer::new("]NULL[")
            .result_variable("rows")
            .serialize(table(3), &mut vars)
            .unwrap();

        let rows = vars.get_object("rows").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["id"], CqlValue::Int(3));
        assert_eq!(rows[2]["name"], CqlValue::Text("n3".into()));
    }

    #[test]
    fn test_collections_and_blobs_render() {
        let t = ResultTable::new(vec![
            ColumnDescriptor::new("l", CqlType::list(CqlType::Text)),
            ColumnDescriptor::new("m", CqlType::map(CqlType::Int, CqlType::Text)),
            ColumnDescriptor::new("b", CqlType::Blob),
        ])
        .with_row([
            CqlValue::List(vec![
                CqlValue::Text("one".into()),
                CqlValue::Text("two".into()),
                CqlValue::Text("three".into()),
            ]),
            CqlValue::Map(vec![
                (CqlValue::Int(1), CqlValue::Text("one".into())),
                (CqlValue::Int(2), CqlValue::Text("two".into())),
            ]),
            CqlValue::Blob(vec![0xca, 0xfe]),
        ])
        .unwrap();

        let out = ResultSerializer::new("]NULL[")
            .serialize(t, &mut Variables::new())
            .unwrap();
        assert_eq!(out, "l\tm\tb\n[one,two,three]\t{1:one,2:two}\t0xcafe\n");
    }

    #[test]
    fn test_mismatched_cell_fails_without_touching_variables() {
        let t = ResultTable::new(vec![ColumnDescriptor::new("a", CqlType::Int)])
            .with_row([CqlValue::Int(1)])
            .unwrap()
            .with_row([CqlValue::Text("x".into())])
            .unwrap();

        let mut vars = Variables::new();
        let err = ResultSerializer::new("]NULL[")
            .variable_names("a")
            .serialize(t, &mut vars)
            .unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
        assert!(vars.is_empty());
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut t = ResultTable::new(vec![ColumnDescriptor::new("a", CqlType::Int)]);
        assert!(t.push_row(Row::new([CqlValue::Int(1), CqlValue::Int(2)])).is_err());
        assert_eq!(t.row_count(), 0);
    }
}
