//! Error types for the conversation driver and the tool surface.

use tabula_core::error::TabulaError;

use crate::state::TurnState;

/// Errors from a conversation session.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("agent error: {0}")]
    Agent(String),
    #[error("turn exceeded the limit of {0} tool calls")]
    ToolBudgetExceeded(usize),
    #[error("invalid turn transition: {0} -> {1}")]
    InvalidTransition(TurnState, TurnState),
    #[error(transparent)]
    Core(#[from] TabulaError),
}

/// Errors returned by a tool to the agent.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error(transparent)]
    Query(#[from] TabulaError),
}

impl ToolError {
    pub(crate) fn invalid_arguments(tool: &str, err: impl std::fmt::Display) -> Self {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: err.to_string(),
        }
    }
}
