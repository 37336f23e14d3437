//! Subcommand implementations. Each returns the text to print.

use std::path::Path;
use std::sync::{Arc, PoisonError};

use tracing::info;

use tabula_chat::render::table_to_html;
use tabula_chat::{Agent, QueryChatConfig, SqliteLayer, ToolOutcome};
use tabula_core::config::TabulaConfig;
use tabula_source::{validate_table_name, DataSource, EngineTable, SqliteEngine};

use crate::cli;
use crate::direct::{DirectAgent, Outcomes};

pub type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// The configured table, opened read-only.
pub struct OpenedSource {
    pub engine: Arc<SqliteEngine>,
    pub source: Arc<dyn DataSource>,
}

pub fn open_source(config: &TabulaConfig) -> AppResult<OpenedSource> {
    let (database, table) = cli::resolve_source(config)?;
    let engine = Arc::new(SqliteEngine::open_read_only(&database)?);
    let source: Arc<dyn DataSource> = Arc::new(EngineTable::new(Arc::clone(&engine), &table)?);
    info!(path = %database.display(), table = %table, "Data source opened");
    Ok(OpenedSource { engine, source })
}

/// Save `config` to `path`, refusing to replace a file unless `force` is set.
pub fn init_config(config: &TabulaConfig, path: &Path, force: bool) -> AppResult<String> {
    if path.exists() && !force {
        return Err(format!("{} already exists; pass --force to replace it", path.display()).into());
    }
    config.save(path)?;
    Ok(format!("Wrote {}", path.display()))
}

pub fn schema(opened: &OpenedSource, config: &TabulaConfig) -> AppResult<String> {
    let description = opened.source.schema(config.source.categorical_threshold)?;
    Ok(description.to_string())
}

pub fn prompt(opened: &OpenedSource, config: &TabulaConfig) -> AppResult<String> {
    let chat = QueryChatConfig::from_settings(Arc::clone(&opened.source), config).build()?;
    Ok(chat.system_prompt().to_string())
}

pub fn preview(opened: &OpenedSource, config: &TabulaConfig, sql: &str, json: bool) -> AppResult<String> {
    let table = opened.source.execute(sql)?;
    if json {
        Ok(serde_json::to_string_pretty(&table.to_records())?)
    } else {
        Ok(table_to_html(&table, config.chat.preview_max_rows))
    }
}

/// Copy the table, optionally filtered by `sql`, into `into` inside `output`.
///
/// Returns the number of rows written. The destination table must not exist.
pub async fn export(
    opened: &OpenedSource,
    config: &TabulaConfig,
    sql: Option<&str>,
    title: &str,
    output: &Path,
    into: &str,
) -> AppResult<usize> {
    validate_table_name(into)?;

    let outcomes: Outcomes = Arc::default();
    let agent_outcomes = Arc::clone(&outcomes);
    let title = title.to_string();
    let chat = QueryChatConfig::from_settings(Arc::clone(&opened.source), config)
        .agent_factory(move |_prompt: &str| -> Box<dyn Agent> {
            Box::new(DirectAgent::new(title.clone(), Arc::clone(&agent_outcomes)))
        })
        .build()?;
    let session = chat.start_session()?;

    if let Some(sql) = sql {
        session.send(sql).await?;
        let rejected = outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find_map(|outcome| match outcome {
                ToolOutcome::Error(message) => Some(message.clone()),
                ToolOutcome::Success(_) => None,
            });
        if let Some(message) = rejected {
            return Err(message.into());
        }
    }

    let layer = SqliteLayer::new(Arc::clone(&opened.engine));
    let data = session.export(&layer)?.collect()?;

    let destination = SqliteEngine::open(output)?;
    destination.create_table(into, &data)?;
    info!(
        path = %output.display(),
        table = into,
        rows = data.num_rows(),
        "Export written"
    );
    Ok(data.num_rows())
}
