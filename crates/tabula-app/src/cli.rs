//! CLI argument definitions for the `tabula` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tabula_core::config::TabulaConfig;
use tabula_core::error::{Result, TabulaError};

/// Tabula: explore one table of a SQLite database through natural-language filters.
#[derive(Parser, Debug)]
#[command(name = "tabula", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// SQLite database file holding the table.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// Table to expose.
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the schema description given to the agent.
    Schema {
        /// Distinct-value limit for listing a text column's categories.
        #[arg(long)]
        threshold: Option<usize>,
    },
    /// Print the rendered system prompt.
    Prompt,
    /// Run a query and print its result without changing anything.
    Preview {
        sql: String,
        /// Print records as JSON instead of an HTML table.
        #[arg(long)]
        json: bool,
        /// Rows to render in the HTML table.
        #[arg(long)]
        rows: Option<usize>,
    },
    /// Apply a filter and copy the resulting rows into another database.
    Export {
        /// Destination database file.
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Filter to apply; exports the whole table when omitted.
        #[arg(long)]
        sql: Option<String>,
        /// Title recorded with the filter.
        #[arg(long, default_value = "Exported view")]
        title: String,
        /// Table name inside the destination database.
        #[arg(long = "into", default_value = tabula_chat::export::EXPORT_TABLE_NAME)]
        into: String,
    },
    /// Write the effective configuration to the config file path.
    InitConfig {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TABULA_CONFIG env var > platform default (~/.tabula/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TABULA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value > info.
    pub fn resolve_log_level(&self, config: Option<&TabulaConfig>) -> String {
        self.log_level
            .clone()
            .or_else(|| config.map(|c| c.general.log_level.clone()))
            .unwrap_or_else(|| "info".to_string())
    }

    /// Write flag values over the loaded configuration.
    pub fn apply_overrides(&self, config: &mut TabulaConfig) {
        if let Some(ref database) = self.database {
            config.source.database = Some(database.clone());
        }
        if let Some(ref table) = self.table {
            config.source.table = Some(table.clone());
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Command::Schema {
            threshold: Some(threshold),
        } = self.command
        {
            config.source.categorical_threshold = threshold;
        }
        if let Command::Preview {
            rows: Some(rows), ..
        } = self.command
        {
            config.chat.preview_max_rows = rows;
        }
    }
}

/// Database and table the commands run against.
pub fn resolve_source(config: &TabulaConfig) -> Result<(PathBuf, String)> {
    let database = config.source.database.clone().ok_or_else(|| {
        TabulaError::Config("no database configured; pass --database or set source.database".to_string())
    })?;
    let table = config.source.table.clone().ok_or_else(|| {
        TabulaError::Config("no table configured; pass --table or set source.table".to_string())
    })?;
    Ok((database, table))
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tabula").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tabula").join("config.toml");
    }
    PathBuf::from("config.toml")
}
