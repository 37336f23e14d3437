//! Source backed by a table that already exists in a SQLite database.

use std::sync::Arc;

use rusqlite::Connection;
use tracing::debug;

use tabula_core::error::{Result, TabulaError};
use tabula_core::types::{DataType, Table, Value};

use crate::convert;
use crate::engine::SqliteEngine;
use crate::schema::{ColumnSchema, SchemaDescription, ValueRange};
use crate::source::{quote_ident, validate_table_name, DataSource};

/// A table living in an external SQLite database.
///
/// SQL is passed straight through to the engine, which may be shared with
/// other sources and sessions.
#[derive(Debug, Clone)]
pub struct EngineTable {
    engine: Arc<SqliteEngine>,
    table_name: String,
}

impl EngineTable {
    /// Bind to `table_name` inside `engine`.
    ///
    /// Only the name's shape is checked here; a missing table surfaces on the
    /// first schema or query call.
    pub fn new(engine: Arc<SqliteEngine>, table_name: &str) -> Result<Self> {
        validate_table_name(table_name)?;
        Ok(Self {
            engine,
            table_name: table_name.to_string(),
        })
    }

    pub fn engine(&self) -> &Arc<SqliteEngine> {
        &self.engine
    }

    fn introspection_error(&self, message: impl std::fmt::Display) -> TabulaError {
        TabulaError::SchemaIntrospection {
            table: self.table_name.clone(),
            message: message.to_string(),
        }
    }

    fn describe(&self, conn: &Connection, categorical_threshold: usize) -> Result<SchemaDescription> {
        let table = quote_ident(&self.table_name);
        let info: Vec<(String, String)> = {
            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info({})", table))
                .map_err(|e| self.introspection_error(e))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
                .map_err(|e| self.introspection_error(e))?;
            rows.collect::<std::result::Result<_, _>>()
                .map_err(|e| self.introspection_error(e))?
        };

        if info.is_empty() {
            return Err(self.introspection_error(format!("no such table: {}", self.table_name)));
        }

        let columns = info
            .into_iter()
            .map(|(name, declared)| {
                let data_type = DataType::from_declared(&declared);
                let declared_type = if declared.trim().is_empty() {
                    data_type.sql_name().to_string()
                } else {
                    declared.to_ascii_uppercase()
                };
                let mut schema = ColumnSchema {
                    name,
                    declared_type,
                    categories: None,
                    range: None,
                };
                // Per-column statistics are best effort; the column is still listed.
                if data_type == DataType::Text {
                    match column_categories(conn, &table, &schema.name, categorical_threshold) {
                        Ok(categories) => schema.categories = categories,
                        Err(e) => debug!(column = %schema.name, error = %e, "Skipping categorical values"),
                    }
                } else if data_type.has_range() {
                    match column_range(conn, &table, &schema.name, data_type) {
                        Ok(range) => schema.range = Some(range),
                        Err(e) => debug!(column = %schema.name, error = %e, "Skipping range"),
                    }
                }
                schema
            })
            .collect();

        Ok(SchemaDescription {
            table_name: self.table_name.clone(),
            columns,
        })
    }
}

fn column_categories(
    conn: &Connection,
    table: &str,
    column: &str,
    threshold: usize,
) -> rusqlite::Result<Option<Vec<String>>> {
    let col = quote_ident(column);
    let distinct: i64 = conn.query_row(
        &format!("SELECT COUNT(DISTINCT {col}) FROM {table}"),
        [],
        |row| row.get(0),
    )?;
    if distinct < 0 || distinct as usize > threshold {
        return Ok(None);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL ORDER BY {col}"
    ))?;
    let values = stmt
        .query_map([], |row| {
            Ok(convert::from_sql(row.get_ref(0)?, Some(DataType::Text)).to_string())
        })?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(Some(values))
}

fn column_range(
    conn: &Connection,
    table: &str,
    column: &str,
    data_type: DataType,
) -> rusqlite::Result<ValueRange> {
    let col = quote_ident(column);
    conn.query_row(
        &format!("SELECT MIN({col}), MAX({col}) FROM {table}"),
        [],
        |row| {
            let min: Value = convert::from_sql(row.get_ref(0)?, Some(data_type));
            let max: Value = convert::from_sql(row.get_ref(1)?, Some(data_type));
            Ok(ValueRange { min, max })
        },
    )
}

impl DataSource for EngineTable {
    fn db_engine(&self) -> &str {
        "SQLite"
    }

    fn table_name(&self) -> Option<&str> {
        Some(&self.table_name)
    }

    fn schema(&self, categorical_threshold: usize) -> Result<SchemaDescription> {
        self.engine.with_conn(|conn| self.describe(conn, categorical_threshold))
    }

    fn unfiltered_data(&self) -> Result<Table> {
        self.engine
            .query(&format!("SELECT * FROM {}", quote_ident(&self.table_name)))
    }

    fn execute(&self, sql: &str) -> Result<Table> {
        debug!(table = %self.table_name, sql, "Executing query");
        self.engine.query(sql)
    }
}
