//! Schema descriptions for the agent's system prompt.
//!
//! The rendered form lists every column with its SQL type, the distinct
//! values of low-cardinality text columns, and the range of numeric and
//! temporal columns.

use std::fmt;

use serde::Serialize;

use tabula_core::types::{DataType, Table, Value};

/// Minimum and maximum of a column. Both are `Null` for an all-null column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: Value,
    pub max: Value,
}

/// One column of a schema description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Type as shown to the agent, e.g. `INTEGER`.
    pub declared_type: String,
    /// Distinct values, present only for categorical text columns.
    pub categories: Option<Vec<String>>,
    pub range: Option<ValueRange>,
}

/// Ordered column descriptions for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescription {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDescription {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Describe an in-memory snapshot.
    ///
    /// Text columns with at most `categorical_threshold` distinct non-null
    /// values list those values (sorted); numeric and temporal columns get
    /// their min/max.
    pub fn from_table(table_name: &str, table: &Table, categorical_threshold: usize) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let values = table.rows().iter().map(|row| &row[idx]);
                let mut schema = ColumnSchema {
                    name: col.name.clone(),
                    declared_type: col.data_type.sql_name().to_string(),
                    categories: None,
                    range: None,
                };
                if col.data_type == DataType::Text {
                    schema.categories = categories(values, categorical_threshold);
                } else if col.data_type.has_range() {
                    schema.range = Some(range(values));
                }
                schema
            })
            .collect();

        Self {
            table_name: table_name.to_string(),
            columns,
        }
    }
}

impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table: {}\nColumns:", self.table_name)?;
        for col in &self.columns {
            write!(f, "\n- {} ({})", col.name, col.declared_type)?;
            if let Some(ref categories) = col.categories {
                let quoted: Vec<String> = categories.iter().map(|c| format!("'{}'", c)).collect();
                write!(f, "\n  Categorical values: {}", quoted.join(", "))?;
            }
            if let Some(ref range) = col.range {
                write!(f, "\n  Range: {} to {}", range.min, range.max)?;
            }
        }
        Ok(())
    }
}

/// Sorted distinct non-null values, or `None` above the threshold.
fn categories<'a>(
    values: impl Iterator<Item = &'a Value>,
    threshold: usize,
) -> Option<Vec<String>> {
    let mut distinct: Vec<String> = values
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .collect();
    distinct.sort();
    distinct.dedup();
    (distinct.len() <= threshold).then_some(distinct)
}

fn range<'a>(values: impl Iterator<Item = &'a Value>) -> ValueRange {
    let mut min: Option<&Value> = None;
    let mut max: Option<&Value> = None;
    for v in values.filter(|v| !v.is_null()) {
        if min.map_or(true, |m| v.compare(m) == Some(std::cmp::Ordering::Less)) {
            min = Some(v);
        }
        if max.map_or(true, |m| v.compare(m) == Some(std::cmp::Ordering::Greater)) {
            max = Some(v);
        }
    }
    ValueRange {
        min: min.cloned().unwrap_or(Value::Null),
        max: max.cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::types::Column;

    fn penguins() -> Table {
        Table::new(
            vec![
                Column::new("species", DataType::Text),
                Column::new("island", DataType::Text),
                Column::new("bill_length_mm", DataType::Float),
                Column::new("year", DataType::Integer),
                Column::new("male", DataType::Boolean),
            ],
            vec![
                vec!["Adelie".into(), "Torgersen".into(), Value::Float(39.1), Value::Integer(2007), Value::Boolean(true)],
                vec!["Gentoo".into(), "Biscoe".into(), Value::Float(46.1), Value::Integer(2009), Value::Boolean(false)],
                vec!["Adelie".into(), "Dream".into(), Value::Null, Value::Integer(2008), Value::Null],
                vec![Value::Null, "Biscoe".into(), Value::Float(50.0), Value::Integer(2007), Value::Boolean(true)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_categorical_columns_sorted_and_distinct() {
        let schema = SchemaDescription::from_table("penguins", &penguins(), 10);
        let species = schema.column("species").unwrap();
        assert_eq!(
            species.categories,
            Some(vec!["Adelie".to_string(), "Gentoo".to_string()])
        );
        assert!(species.range.is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let schema = SchemaDescription::from_table("penguins", &penguins(), 3);
        assert!(schema.column("island").unwrap().categories.is_some());

        let schema = SchemaDescription::from_table("penguins", &penguins(), 2);
        assert!(schema.column("island").unwrap().categories.is_none());
        assert!(schema.column("species").unwrap().categories.is_some());
    }

    #[test]
    fn test_zero_threshold_disables_categories() {
        let schema = SchemaDescription::from_table("penguins", &penguins(), 0);
        assert!(schema.columns.iter().all(|c| c.categories.is_none()));
    }

    #[test]
    fn test_numeric_ranges_skip_nulls() {
        let schema = SchemaDescription::from_table("penguins", &penguins(), 10);
        let bill = schema.column("bill_length_mm").unwrap();
        assert_eq!(
            bill.range,
            Some(ValueRange {
                min: Value::Float(39.1),
                max: Value::Float(50.0)
            })
        );
        let year = schema.column("year").unwrap().range.clone().unwrap();
        assert_eq!(year.min, Value::Integer(2007));
        assert_eq!(year.max, Value::Integer(2009));
    }

    #[test]
    fn test_boolean_has_neither_range_nor_categories() {
        let schema = SchemaDescription::from_table("penguins", &penguins(), 10);
        let male = schema.column("male").unwrap();
        assert_eq!(male.declared_type, "BOOLEAN");
        assert!(male.range.is_none());
        assert!(male.categories.is_none());
    }

    #[test]
    fn test_all_null_column_range() {
        let table = Table::new(
            vec![Column::new("x", DataType::Integer)],
            vec![vec![Value::Null], vec![Value::Null]],
        )
        .unwrap();
        let schema = SchemaDescription::from_table("t", &table, 10);
        assert_eq!(schema.to_string(), "Table: t\nColumns:\n- x (INTEGER)\n  Range: NULL to NULL");
    }

    #[test]
    fn test_render() {
        let schema = SchemaDescription::from_table("penguins", &penguins(), 10);
        let text = schema.to_string();
        assert!(text.starts_with("Table: penguins\nColumns:\n- species (TEXT)\n"));
        assert!(text.contains("  Categorical values: 'Adelie', 'Gentoo'"));
        assert!(text.contains("- bill_length_mm (FLOAT)\n  Range: 39.1 to 50"));
        assert!(text.contains("- year (INTEGER)\n  Range: 2007 to 2009"));
        assert!(text.contains("- male (BOOLEAN)"));
    }
}
