//! Tabula data sources.
//!
//! One execution contract ([`DataSource`]) over two backends: an in-memory
//! table registered inside a private SQLite connection, and a table that
//! already lives in a SQLite database. Also provides schema introspection
//! used to build the agent's system prompt.

pub mod convert;
pub mod engine;
pub mod engine_table;
pub mod memory;
pub mod schema;
pub mod source;

pub use engine::SqliteEngine;
pub use engine_table::EngineTable;
pub use memory::InMemoryTable;
pub use schema::{ColumnSchema, SchemaDescription, ValueRange};
pub use source::{quote_ident, validate_table_name, DataSource};
