use thiserror::Error;

/// Top-level error type for Tabula.
///
/// Backend messages are carried verbatim: the agent needs the literal engine
/// error to correct its SQL, so nothing here rewrites or shortens them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TabulaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema introspection failed for table '{table}': {message}")]
    SchemaIntrospection { table: String, message: String },

    #[error("{message}")]
    QueryExecution { sql: String, message: String },

    #[error("Export unavailable: {0}")]
    ExportUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TabulaError {
    /// Build a query execution error for `sql` from any backend error.
    pub fn query(sql: impl Into<String>, err: impl std::fmt::Display) -> Self {
        TabulaError::QueryExecution {
            sql: sql.into(),
            message: err.to_string(),
        }
    }

    /// The SQL text that failed, for query execution errors.
    pub fn failed_sql(&self) -> Option<&str> {
        match self {
            TabulaError::QueryExecution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for TabulaError {
    fn from(err: toml::de::Error) -> Self {
        TabulaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TabulaError {
    fn from(err: toml::ser::Error) -> Self {
        TabulaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TabulaError {
    fn from(err: serde_json::Error) -> Self {
        TabulaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tabula operations.
pub type Result<T> = std::result::Result<T, TabulaError>;
