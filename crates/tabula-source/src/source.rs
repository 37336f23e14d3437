//! The data source contract and the checks shared by both backends.

use std::sync::LazyLock;

use regex::Regex;

use tabula_core::error::{Result, TabulaError};
use tabula_core::types::Table;

use crate::schema::SchemaDescription;

/// A queryable table.
///
/// Implementations must not mutate the backend in `schema` or
/// `unfiltered_data`. `execute` runs whatever SQL it is given; keeping the
/// agent to `SELECT` statements is the system prompt's job, not this trait's.
pub trait DataSource: Send + Sync {
    /// Engine identifier substituted into the system prompt (e.g. "SQLite").
    fn db_engine(&self) -> &str;

    /// Name the table is queried by, when the source has one.
    fn table_name(&self) -> Option<&str>;

    /// Describe columns, types, categorical values and ranges.
    fn schema(&self, categorical_threshold: usize) -> Result<SchemaDescription>;

    /// The full table with no filter applied.
    fn unfiltered_data(&self) -> Result<Table>;

    /// Run `sql` and return its result set.
    ///
    /// Backend failures surface as `TabulaError::QueryExecution` with the
    /// engine's message unchanged.
    fn execute(&self, sql: &str) -> Result<Table>;
}

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("Invalid table name regex"));

/// Check that `name` begins with a letter and contains only letters, digits
/// and underscores.
pub fn validate_table_name(name: &str) -> Result<()> {
    if TABLE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(TabulaError::Config(format!(
            "Table name must begin with a letter and contain only letters, numbers, and underscores (got '{}')",
            name
        )))
    }
}

/// Quote an identifier for use in SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        for name in ["t", "T", "titanic", "mtcars_2024", "a1_b2_c3", "Z_"] {
            assert!(validate_table_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_table_names() {
        for name in [
            "", "3bad", "_leading", "has space", "semi;colon", "dash-name", "quo\"te", "café",
            "t\n",
        ] {
            let err = validate_table_name(name).unwrap_err();
            assert!(
                matches!(err, TabulaError::Config(_)),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_error_message_names_the_rule() {
        let err = validate_table_name("3bad").unwrap_err();
        assert!(err.to_string().contains("must begin with a letter"));
        assert!(err.to_string().contains("3bad"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("survived"), "\"survived\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
        assert_eq!(quote_ident("with space"), "\"with space\"");
    }
}
