//! In-memory table source.
//!
//! The snapshot is copied into a private in-memory SQLite connection under
//! the caller's table name, so arbitrary SQL can run against plain data.

use tracing::{debug, info};

use tabula_core::error::Result;
use tabula_core::types::Table;

use crate::engine::SqliteEngine;
use crate::schema::SchemaDescription;
use crate::source::{validate_table_name, DataSource};

/// A table snapshot queried through an embedded SQLite engine.
#[derive(Debug)]
pub struct InMemoryTable {
    table_name: String,
    data: Table,
    engine: SqliteEngine,
}

impl InMemoryTable {
    /// Register `data` under `table_name`.
    ///
    /// The name is validated before any engine work happens.
    pub fn new(data: Table, table_name: &str) -> Result<Self> {
        validate_table_name(table_name)?;

        let engine = SqliteEngine::in_memory()?;
        engine.create_table(table_name, &data)?;
        // The copy must keep matching `data`; statements that write fail.
        engine.execute_batch("PRAGMA query_only = ON;")?;

        info!(
            table = table_name,
            rows = data.num_rows(),
            columns = data.num_columns(),
            "In-memory table registered"
        );

        Ok(Self {
            table_name: table_name.to_string(),
            data,
            engine,
        })
    }

    /// The owned snapshot.
    pub fn data(&self) -> &Table {
        &self.data
    }
}

impl DataSource for InMemoryTable {
    fn db_engine(&self) -> &str {
        "SQLite"
    }

    fn table_name(&self) -> Option<&str> {
        Some(&self.table_name)
    }

    fn schema(&self, categorical_threshold: usize) -> Result<SchemaDescription> {
        Ok(SchemaDescription::from_table(
            &self.table_name,
            &self.data,
            categorical_threshold,
        ))
    }

    fn unfiltered_data(&self) -> Result<Table> {
        Ok(self.data.clone())
    }

    fn execute(&self, sql: &str) -> Result<Table> {
        debug!(table = %self.table_name, sql, "Executing query");
        self.engine.query(sql)
    }
}
