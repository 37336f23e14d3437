//! Shared building blocks for Tabula: the table/value model, the error
//! taxonomy, and TOML configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::TabulaConfig;
pub use error::{Result, TabulaError};
pub use types::*;
