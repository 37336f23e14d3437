//! SQLite engine handle.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Every data source and export relation runs its SQL through this type.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use tabula_core::error::{Result, TabulaError};
use tabula_core::types::{Column, DataType, Table};

use crate::convert;
use crate::source::quote_ident;

/// How long a locked database file is retried before a query fails.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread-safe SQLite connection wrapper.
///
/// The connection is wrapped in a Mutex since rusqlite Connection is not
/// Sync; queries on one engine are serialized.
pub struct SqliteEngine {
    conn: Mutex<Connection>,
}

impl SqliteEngine {
    /// Open (or create) a database file for reading and writing.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| TabulaError::Storage(format!("Failed to open database: {}", e)))?;
        let engine = Self::configure(conn)?;
        info!("Database opened at {}", path.display());
        Ok(engine)
    }

    /// Open an existing database file without write access.
    ///
    /// Sessions that only ever read can share one read-only engine.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            // NO_MUTEX relies on `conn` staying behind the engine's Mutex.
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| TabulaError::Storage(format!("Failed to open database: {}", e)))?;
        let engine = Self::configure(conn)?;
        info!("Database opened read-only at {}", path.display());
        Ok(engine)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TabulaError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::configure(conn)
    }

    /// Wrap a connection the caller has already opened.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| TabulaError::Storage(format!("Failed to set busy timeout: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| TabulaError::Storage(format!("Failed to set pragmas: {}", e)))?;
        Ok(Self::from_connection(conn))
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TabulaError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run `sql` and collect its result set.
    pub fn query(&self, sql: &str) -> Result<Table> {
        self.with_conn(|conn| query_table(conn, sql))
    }

    /// Run one or more statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| TabulaError::query(sql, e))
        })
    }

    /// Whether a table or view with this name exists, temporary ones included.
    pub fn has_table(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM (
                         SELECT type, name FROM sqlite_master
                         UNION ALL
                         SELECT type, name FROM sqlite_temp_master
                     ) WHERE type IN ('table', 'view') AND name = ?1",
                    [name],
                    |row| row.get(0),
                )
                .map_err(|e| TabulaError::Storage(e.to_string()))?;
            Ok(count > 0)
        })
    }

    /// Create `name` with the columns of `data` and load its rows.
    pub fn create_table(&self, name: &str, data: &Table) -> Result<()> {
        self.with_conn(|conn| load_table(conn, "", name, data))
    }

    /// Create (or replace) a connection-local temporary table holding `data`.
    pub fn create_temp_table(&self, name: &str, data: &Table) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(&format!("DROP TABLE IF EXISTS temp.{}", quote_ident(name)), [])
                .map_err(|e| TabulaError::Storage(format!("Failed to replace table: {}", e)))?;
            load_table(conn, "TEMP ", name, data)
        })
    }
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine").finish()
    }
}

fn load_table(conn: &Connection, modifier: &str, name: &str, data: &Table) -> Result<()> {
    let column_defs: Vec<String> = data
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.data_type.sql_name()))
        .collect();
    let create = format!(
        "CREATE {}TABLE {} ({})",
        modifier,
        quote_ident(name),
        column_defs.join(", ")
    );
    conn.execute(&create, [])
        .map_err(|e| TabulaError::Storage(format!("Failed to create table {}: {}", name, e)))?;

    if data.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; data.num_columns()].join(", ");
    let insert = format!("INSERT INTO {} VALUES ({})", quote_ident(name), placeholders);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| TabulaError::Storage(e.to_string()))?;
    {
        let mut stmt = tx
            .prepare(&insert)
            .map_err(|e| TabulaError::Storage(e.to_string()))?;
        for row in data.rows() {
            stmt.execute(rusqlite::params_from_iter(row.iter().map(convert::to_sql)))
                .map_err(|e| TabulaError::Storage(format!("Failed to load row: {}", e)))?;
        }
    }
    tx.commit()
        .map_err(|e| TabulaError::Storage(e.to_string()))?;
    debug!(table = name, rows = data.num_rows(), "Table loaded");
    Ok(())
}

/// Run `sql` on `conn` and convert the rows into a [`Table`].
///
/// Columns that map directly onto a table column use its declared type;
/// expression columns take the type of their first non-null value.
pub(crate) fn query_table(conn: &Connection, sql: &str) -> Result<Table> {
    let mut stmt = conn.prepare(sql).map_err(|e| TabulaError::query(sql, e))?;

    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let declared: Vec<Option<DataType>> = stmt
        .columns()
        .iter()
        .map(|col| col.decl_type().map(DataType::from_declared))
        .collect();

    let mut rows = stmt.query([]).map_err(|e| TabulaError::query(sql, e))?;
    let mut data = Vec::new();
    while let Some(row) = rows.next().map_err(|e| TabulaError::query(sql, e))? {
        let mut values = Vec::with_capacity(names.len());
        for (idx, decl) in declared.iter().enumerate() {
            let raw = row.get_ref(idx).map_err(|e| TabulaError::query(sql, e))?;
            values.push(convert::from_sql(raw, *decl));
        }
        data.push(values);
    }

    let columns = names
        .into_iter()
        .zip(&declared)
        .enumerate()
        .map(|(idx, (name, decl))| {
            let data_type =
                decl.unwrap_or_else(|| convert::infer_type(data.iter().map(|row| &row[idx])));
            Column::new(name, data_type)
        })
        .collect();

    debug!(rows = data.len(), "Query executed");
    Table::new(columns, data)
}
