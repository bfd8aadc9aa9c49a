//! Data model for a single-table extraction.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Column names of the fixed telemetry schema, in table order.
pub const TELEMETRY_COLUMNS: [&str; 12] = [
    "id",
    "timestamp",
    "temperature_1",
    "temperature_2",
    "temperature_3",
    "temperature_4",
    "humidity",
    "pressure",
    "door_status",
    "power_status",
    "fan_status",
    "alarm_status",
];

/// How much of the table a query retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueryMode {
    /// Unconditional `SELECT *` snapshot of the whole table
    #[default]
    All,
    /// Constrained retrieval; recognized but not implemented
    Filtered,
}

/// Which table to dump and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Table name, unquoted
    pub table: String,
    /// Retrieval mode
    pub mode: QueryMode,
}

impl QuerySpec {
    /// Full-table query for `table`.
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            mode: QueryMode::All,
        }
    }

    /// Filtered query for `table`.
    pub fn filtered(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            mode: QueryMode::Filtered,
        }
    }
}

/// Ordered list of column names used as the output header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    columns: Vec<String>,
}

impl SchemaDescriptor {
    /// Creates a descriptor from column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The 12-column telemetry schema.
    pub fn telemetry() -> Self {
        Self::new(TELEMETRY_COLUMNS)
    }

    /// Column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the descriptor names no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fails with `SchemaMismatch` unless `actual` equals the column count.
    pub fn check_arity(&self, actual: usize) -> crate::Result<()> {
        if actual == self.columns.len() {
            Ok(())
        } else {
            Err(crate::error::Db2FileError::SchemaMismatch {
                expected: self.columns.len(),
                actual,
            })
        }
    }
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::telemetry()
    }
}

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Signed integer
    Integer(i64),
    /// Unsigned integer wider than `i64` allows
    Unsigned(u64),
    /// Floating point
    Float(f64),
    /// Text, including decimals the driver reports as strings
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Date and time without a zone
    DateTime(NaiveDateTime),
}

/// A fully materialized query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names as reported by the driver
    pub columns: Vec<String>,
    /// Rows in result-set order, each with `columns.len()` values
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Builds a result from driver output.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_schema_has_twelve_columns() {
        let schema = SchemaDescriptor::telemetry();
        assert_eq!(schema.len(), 12);
        assert_eq!(schema.columns()[0], "id");
        assert_eq!(schema, SchemaDescriptor::default());
    }

    #[test]
    fn test_check_arity() {
        let schema = SchemaDescriptor::new(["a", "b", "c"]);
        assert!(schema.check_arity(3).is_ok());

        let err = schema.check_arity(2).unwrap_err();
        assert!(matches!(
            err,
            crate::Db2FileError::SchemaMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_query_spec_constructors() {
        assert_eq!(QuerySpec::all("t").mode, QueryMode::All);
        assert_eq!(QuerySpec::filtered("t").mode, QueryMode::Filtered);
        assert_eq!(QueryMode::default(), QueryMode::All);
    }
}
