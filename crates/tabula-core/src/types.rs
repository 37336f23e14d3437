//! Tabular data model shared by every data source.
//!
//! A [`Table`] is a rectangular, column-typed snapshot of query results.
//! Values are owned scalars; nothing here borrows from a live connection.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, TabulaError};

/// Text format used for `DATE` values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Text format used for `TIMESTAMP` values.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// =============================================================================
// DataType
// =============================================================================

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Text,
}

impl DataType {
    /// SQL declared type used when creating tables and describing schemas.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Text => "TEXT",
        }
    }

    /// Map a declared column type to a logical type using SQLite affinity rules.
    pub fn from_declared(declared: &str) -> DataType {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            DataType::Integer
        } else if upper.contains("BOOL") {
            DataType::Boolean
        } else if upper.contains("DATETIME")
            || upper.contains("TIMESTAMP")
            || upper.contains("TIME")
        {
            DataType::Timestamp
        } else if upper.contains("DATE") {
            DataType::Date
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            DataType::Float
        } else {
            DataType::Text
        }
    }

    /// Whether schema descriptions report a min/max range for this type.
    pub fn has_range(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Float | DataType::Date | DataType::Timestamp
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

// =============================================================================
// Value
// =============================================================================

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used for cross-type comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare two values of compatible kinds. Mixed or null pairs yield `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// JSON representation used for tool output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Date(_) | Value::Timestamp(_) | Value::Text(_) => {
                serde_json::Value::String(self.to_string())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Table
// =============================================================================

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Rectangular table snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, rejecting rows whose width differs from the column count.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(TabulaError::Config(format!(
                "row {} has {} values but the table has {} columns",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// A table with columns and no rows.
    pub fn empty(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// All values of the named column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// The first `n` rows (or all rows if fewer).
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Row records as a JSON array of objects, keys in column order.
    pub fn to_records(&self) -> serde_json::Value {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, value)| (col.name.clone(), value.to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec![
                Column::new("id", DataType::Integer),
                Column::new("name", DataType::Text),
                Column::new("fare", DataType::Float),
            ],
            vec![
                vec![Value::Integer(1), "Alice".into(), Value::Float(7.25)],
                vec![Value::Integer(2), "Bob".into(), Value::Null],
                vec![Value::Integer(3), "Carol".into(), Value::Float(71.28)],
            ],
        )
        .unwrap()
    }

    // ---- DataType ----

    #[test]
    fn test_from_declared_affinity() {
        assert_eq!(DataType::from_declared("INTEGER"), DataType::Integer);
        assert_eq!(DataType::from_declared("bigint"), DataType::Integer);
        assert_eq!(DataType::from_declared("REAL"), DataType::Float);
        assert_eq!(DataType::from_declared("DOUBLE PRECISION"), DataType::Float);
        assert_eq!(DataType::from_declared("NUMERIC(10,2)"), DataType::Float);
        assert_eq!(DataType::from_declared("BOOLEAN"), DataType::Boolean);
        assert_eq!(DataType::from_declared("DATE"), DataType::Date);
        assert_eq!(DataType::from_declared("DATETIME"), DataType::Timestamp);
        assert_eq!(DataType::from_declared("TIMESTAMP"), DataType::Timestamp);
        assert_eq!(DataType::from_declared("VARCHAR(20)"), DataType::Text);
        assert_eq!(DataType::from_declared(""), DataType::Text);
    }

    #[test]
    fn test_sql_name_round_trips_through_declared() {
        for dt in [
            DataType::Integer,
            DataType::Float,
            DataType::Boolean,
            DataType::Date,
            DataType::Timestamp,
            DataType::Text,
        ] {
            assert_eq!(DataType::from_declared(dt.sql_name()), dt);
        }
    }

    #[test]
    fn test_has_range() {
        assert!(DataType::Integer.has_range());
        assert!(DataType::Date.has_range());
        assert!(!DataType::Text.has_range());
        assert!(!DataType::Boolean.has_range());
    }

    // ---- Value ----

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        let d = NaiveDate::from_ymd_opt(1912, 4, 15).unwrap();
        assert_eq!(Value::Date(d).to_string(), "1912-04-15");
        let ts = d.and_hms_opt(2, 20, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "1912-04-15 02:20:00");
    }

    #[test]
    fn test_value_compare_mixed_numeric() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Text("a".into()).compare(&Value::Integer(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::Integer(891).to_json(), serde_json::json!(891));
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Text("S".into()).to_json(), serde_json::json!("S"));
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    // ---- Table ----

    #[test]
    fn test_table_rejects_ragged_rows() {
        let err = Table::new(
            vec![Column::new("a", DataType::Integer)],
            vec![vec![Value::Integer(1), Value::Integer(2)]],
        )
        .unwrap_err();
        assert!(matches!(err, TabulaError::Config(_)));
    }

    #[test]
    fn test_table_accessors() {
        let t = sample();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.num_columns(), 3);
        assert_eq!(t.column_index("fare"), Some(2));
        assert!(t.column_index("missing").is_none());
        let names = t.column_values("name").unwrap();
        assert_eq!(names[1], &Value::Text("Bob".into()));
    }

    #[test]
    fn test_head_truncates() {
        let t = sample();
        assert_eq!(t.head(2).num_rows(), 2);
        assert_eq!(t.head(10).num_rows(), 3);
        assert_eq!(t.head(0).num_columns(), 3);
    }

    #[test]
    fn test_to_records_preserves_column_order() {
        let t = sample();
        let records = t.to_records();
        let first = records[0].as_object().unwrap();
        let keys: Vec<&String> = first.keys().collect();
        assert_eq!(keys, vec!["id", "name", "fare"]);
        assert_eq!(records[1]["fare"], serde_json::Value::Null);
        assert_eq!(
            serde_json::to_string(&records[0]).unwrap(),
            r#"{"id":1,"name":"Alice","fare":7.25}"#
        );
    }

    #[test]
    fn test_empty_table_records() {
        let t = Table::empty(vec![Column::new("n", DataType::Integer)]);
        assert!(t.is_empty());
        assert_eq!(t.to_records(), serde_json::json!([]));
    }
}
