//! Bulk export of a session's current view to an analytical query layer.
//!
//! A layer builds relations lazily: handing over the current view costs
//! nothing until the caller collects it.

use std::sync::Arc;

use tracing::debug;

use tabula_core::error::Result;
use tabula_core::types::Table;
use tabula_source::{quote_ident, SqliteEngine};

/// Name given to materialized session data inside a layer.
pub const EXPORT_TABLE_NAME: &str = "tabula_data";

/// An analytical query layer that can take over a session's data.
pub trait AnalyticalLayer {
    type Relation;

    /// Whether `name` can be referenced directly.
    fn has_table(&self, name: &str) -> Result<bool>;

    /// Relation defined by a SQL query.
    fn sql(&self, query: &str) -> Result<Self::Relation>;

    /// Relation over an existing table.
    fn table(&self, name: &str) -> Result<Self::Relation>;

    /// Copy `data` into the layer under `name` and return it as a relation.
    fn create_table(&self, name: &str, data: &Table) -> Result<Self::Relation>;
}

/// Layer over a SQLite engine. Materialized tables are temporary.
#[derive(Debug, Clone)]
pub struct SqliteLayer {
    engine: Arc<SqliteEngine>,
}

impl SqliteLayer {
    pub fn new(engine: Arc<SqliteEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<SqliteEngine> {
        &self.engine
    }
}

impl AnalyticalLayer for SqliteLayer {
    type Relation = LazyRelation;

    fn has_table(&self, name: &str) -> Result<bool> {
        self.engine.has_table(name)
    }

    fn sql(&self, query: &str) -> Result<LazyRelation> {
        Ok(LazyRelation::new(Arc::clone(&self.engine), query))
    }

    fn table(&self, name: &str) -> Result<LazyRelation> {
        self.sql(&format!("SELECT * FROM {}", quote_ident(name)))
    }

    fn create_table(&self, name: &str, data: &Table) -> Result<LazyRelation> {
        self.engine.create_temp_table(name, data)?;
        debug!(table = name, rows = data.num_rows(), "Materialized export table");
        self.table(name)
    }
}

/// A query that runs only when collected.
#[derive(Debug, Clone)]
pub struct LazyRelation {
    engine: Arc<SqliteEngine>,
    sql: String,
}

impl LazyRelation {
    fn new(engine: Arc<SqliteEngine>, sql: &str) -> Self {
        Self {
            engine,
            sql: sql.trim().trim_end_matches(';').to_string(),
        }
    }

    /// SQL this relation evaluates.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// At most `n` rows of this relation.
    pub fn limit(&self, n: usize) -> LazyRelation {
        LazyRelation {
            engine: Arc::clone(&self.engine),
            sql: format!("SELECT * FROM (\n{}\n) LIMIT {}", self.sql, n),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let table = self
            .engine
            .query(&format!("SELECT COUNT(*) AS n FROM (\n{}\n)", self.sql))?;
        Ok(table
            .rows()
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_f64())
            .map_or(0, |n| n as usize))
    }

    /// Run the query.
    pub fn collect(&self) -> Result<Table> {
        self.engine.query(&self.sql)
    }
}
