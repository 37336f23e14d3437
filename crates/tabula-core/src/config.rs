use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TabulaError};

/// Default number of distinct values under which a text column is categorical.
pub const DEFAULT_CATEGORICAL_THRESHOLD: usize = 10;

/// Default number of rows rendered into the transcript by a preview.
pub const DEFAULT_PREVIEW_MAX_ROWS: usize = 5;

/// Default cap on tool calls the agent may make within one turn.
pub const DEFAULT_MAX_TOOL_CALLS_PER_TURN: usize = 16;

/// Top-level configuration.
///
/// Loaded from `tabula.toml` (or the file named by `TABULA_CONFIG`). Every
/// section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabulaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl TabulaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TabulaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chat.preview_max_rows == 0 {
            return Err(TabulaError::Config(
                "chat.preview_max_rows must be at least 1".to_string(),
            ));
        }
        if self.chat.max_tool_calls_per_turn == 0 {
            return Err(TabulaError::Config(
                "chat.max_tool_calls_per_turn must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Which backend table to query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path to a SQLite database file.
    pub database: Option<PathBuf>,
    /// Table to query inside the database.
    pub table: Option<String>,
    /// Maximum distinct values for a text column to be listed as categorical.
    pub categorical_threshold: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: None,
            table: None,
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
        }
    }
}

/// Text that is either given inline or read from a file.
///
/// In TOML: `greeting = "Hello!"` or `greeting = { path = "greeting.md" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptText {
    Inline(String),
    File { path: PathBuf },
}

impl PromptText {
    /// Return the text, reading it from disk for the file form.
    pub fn resolve(&self) -> Result<String> {
        match self {
            PromptText::Inline(text) => Ok(text.clone()),
            PromptText::File { path } => std::fs::read_to_string(path).map_err(|e| {
                TabulaError::Config(format!("cannot read {}: {}", path.display(), e))
            }),
        }
    }
}

impl From<&str> for PromptText {
    fn from(text: &str) -> Self {
        PromptText::Inline(text.to_string())
    }
}

impl From<String> for PromptText {
    fn from(text: String) -> Self {
        PromptText::Inline(text)
    }
}

impl From<PathBuf> for PromptText {
    fn from(path: PathBuf) -> Self {
        PromptText::File { path }
    }
}

/// System prompt inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Message shown at session start. When absent the agent writes one.
    pub greeting: Option<PromptText>,
    /// Plain-text or Markdown description of the data.
    pub data_description: Option<PromptText>,
    /// Additional instructions appended to the prompt.
    pub extra_instructions: Option<PromptText>,
    /// Custom prompt template replacing the built-in one.
    pub template: Option<PromptText>,
    /// Complete system prompt; the template inputs are ignored when set.
    pub system_prompt_override: Option<PromptText>,
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Rows rendered into the transcript for a preview query.
    pub preview_max_rows: usize,
    /// Tool calls allowed within a single turn.
    pub max_tool_calls_per_turn: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            preview_max_rows: DEFAULT_PREVIEW_MAX_ROWS,
            max_tool_calls_per_turn: DEFAULT_MAX_TOOL_CALLS_PER_TURN,
        }
    }
}
