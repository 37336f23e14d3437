//! An agent without a language model.
//!
//! Each turn's input is taken as SQL and committed through the session's
//! `update_dashboard` tool, so filters applied from the command line go
//! through the same validation and transcript as the conversational ones.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use tabula_chat::tools::update_dashboard;
use tabula_chat::{Agent, AgentEvent, ChatError, ToolDefinition, ToolOutcome};

/// Outcomes of every tool call made by a [`DirectAgent`], oldest first.
pub type Outcomes = Arc<Mutex<Vec<ToolOutcome>>>;

pub struct DirectAgent {
    title: String,
    pending: VecDeque<AgentEvent>,
    outcomes: Outcomes,
    calls: usize,
    tools: Vec<String>,
}

impl DirectAgent {
    pub fn new(title: impl Into<String>, outcomes: Outcomes) -> Self {
        Self {
            title: title.into(),
            pending: VecDeque::new(),
            outcomes,
            calls: 0,
            tools: Vec::new(),
        }
    }
}

#[async_trait]
impl Agent for DirectAgent {
    fn register_tool(&mut self, definition: ToolDefinition) {
        self.tools.push(definition.name);
    }

    async fn begin_turn(&mut self, input: &str) -> Result<(), ChatError> {
        if !self.tools.iter().any(|t| t == update_dashboard::NAME) {
            return Err(ChatError::Agent(format!(
                "tool {} is not registered",
                update_dashboard::NAME
            )));
        }
        self.calls += 1;
        self.pending.push_back(AgentEvent::ToolCall {
            id: format!("direct-{}", self.calls),
            name: update_dashboard::NAME.to_string(),
            arguments: json!({ "query": input, "title": self.title }),
        });
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<AgentEvent>, ChatError> {
        Ok(self.pending.pop_front())
    }

    async fn submit_tool_result(&mut self, _call_id: &str, outcome: ToolOutcome) -> Result<(), ChatError> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
        Ok(())
    }
}
