//! Contract with the external language-model agent.
//!
//! The agent is constructed from a system prompt by an [`AgentFactory`],
//! told about the available tools, and then driven one turn at a time: the
//! driver starts a turn with the user's input and pulls events until the
//! agent has nothing more to say. Every tool call is answered with a
//! [`ToolOutcome`] before the next event is pulled.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::tool::ToolDefinition;

/// Something the agent produced during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A fragment of the streamed reply.
    Text(String),
    /// A request to invoke a registered tool.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

/// Result of a tool call, fed back to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(serde_json::Value),
    Error(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }
}

/// A conversational agent backed by a language model.
#[async_trait]
pub trait Agent: Send {
    /// Make a tool available for subsequent turns.
    fn register_tool(&mut self, definition: ToolDefinition);

    /// Start a turn with the given user input.
    async fn begin_turn(&mut self, input: &str) -> Result<(), ChatError>;

    /// Next event of the current turn, or `None` once the turn is complete.
    async fn next_event(&mut self) -> Result<Option<AgentEvent>, ChatError>;

    /// Answer the tool call with the given id.
    async fn submit_tool_result(&mut self, call_id: &str, outcome: ToolOutcome)
        -> Result<(), ChatError>;
}

/// Builds an agent from a rendered system prompt.
pub type AgentFactory = Arc<dyn Fn(&str) -> Box<dyn Agent> + Send + Sync>;
