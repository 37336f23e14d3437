//! Session configuration and the conversation driver.
//!
//! [`QueryChatConfig`] is assembled once per data source: it resolves the
//! prompt inputs, introspects the schema and renders the system prompt.
//! Each [`QuerySession`] started from it owns its agent, committed query
//! and transcript.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tabula_core::config::{
    PromptText, TabulaConfig, DEFAULT_CATEGORICAL_THRESHOLD, DEFAULT_MAX_TOOL_CALLS_PER_TURN,
    DEFAULT_PREVIEW_MAX_ROWS,
};
use tabula_core::error::{Result, TabulaError};
use tabula_core::types::Table;
use tabula_source::DataSource;

use crate::agent::{Agent, AgentEvent, AgentFactory, ToolOutcome};
use crate::error::ChatError;
use crate::export::{AnalyticalLayer, EXPORT_TABLE_NAME};
use crate::prompt::{self, PromptInputs};
use crate::state::{QueryState, SessionState, TurnState, TurnStateMachine};
use crate::tool::ToolRegistry;
use crate::tools::{self, ToolContext};
use crate::transcript::Transcript;

/// Sent to the agent when no greeting is configured.
pub const GREETING_REQUEST: &str =
    "Please give me a friendly greeting. Include a few sample prompts in a two-level bulleted list.";

// =============================================================================
// Configuration
// =============================================================================

/// Everything needed to start sessions over one data source.
pub struct QueryChatConfig {
    source: Arc<dyn DataSource>,
    system_prompt: String,
    greeting: Option<String>,
    preview_max_rows: usize,
    max_tool_calls_per_turn: usize,
    agent_factory: Option<AgentFactory>,
}

/// Builder for [`QueryChatConfig`].
pub struct QueryChatConfigBuilder {
    source: Arc<dyn DataSource>,
    greeting: Option<PromptText>,
    data_description: Option<PromptText>,
    extra_instructions: Option<PromptText>,
    prompt_template: Option<PromptText>,
    system_prompt_override: Option<PromptText>,
    categorical_threshold: usize,
    preview_max_rows: usize,
    max_tool_calls_per_turn: usize,
    agent_factory: Option<AgentFactory>,
}

impl QueryChatConfig {
    pub fn builder(source: Arc<dyn DataSource>) -> QueryChatConfigBuilder {
        QueryChatConfigBuilder {
            source,
            greeting: None,
            data_description: None,
            extra_instructions: None,
            prompt_template: None,
            system_prompt_override: None,
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            preview_max_rows: DEFAULT_PREVIEW_MAX_ROWS,
            max_tool_calls_per_turn: DEFAULT_MAX_TOOL_CALLS_PER_TURN,
            agent_factory: None,
        }
    }

    /// A builder pre-filled from the `[source]`, `[prompt]` and `[chat]`
    /// sections of a config file.
    pub fn from_settings(source: Arc<dyn DataSource>, config: &TabulaConfig) -> QueryChatConfigBuilder {
        let prompt = &config.prompt;
        let mut builder = Self::builder(source)
            .categorical_threshold(config.source.categorical_threshold)
            .preview_max_rows(config.chat.preview_max_rows)
            .max_tool_calls_per_turn(config.chat.max_tool_calls_per_turn);
        builder.greeting = prompt.greeting.clone();
        builder.data_description = prompt.data_description.clone();
        builder.extra_instructions = prompt.extra_instructions.clone();
        builder.prompt_template = prompt.template.clone();
        builder.system_prompt_override = prompt.system_prompt_override.clone();
        builder
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Create an agent and a fresh session around it.
    pub fn start_session(&self) -> std::result::Result<QuerySession, ChatError> {
        let factory = self
            .agent_factory
            .as_ref()
            .ok_or_else(|| TabulaError::Config("no agent factory configured".to_string()))?;

        let state = Arc::new(SessionState::new());
        let transcript = Arc::new(Transcript::new());
        let tools = tools::session_tools(
            ToolContext {
                source: Arc::clone(&self.source),
                state: Arc::clone(&state),
                transcript: Arc::clone(&transcript),
            },
            self.preview_max_rows,
        );

        let mut agent = factory(&self.system_prompt);
        for definition in tools.definitions() {
            agent.register_tool(definition);
        }

        let id = Uuid::new_v4();
        info!(session = %id, table = ?self.source.table_name(), "Session started");

        Ok(QuerySession {
            id,
            source: Arc::clone(&self.source),
            state,
            transcript,
            tools,
            agent: Arc::new(Mutex::new(agent)),
            turn: TurnStateMachine::new(),
            greeting: self.greeting.clone(),
            max_tool_calls_per_turn: self.max_tool_calls_per_turn,
        })
    }
}

impl QueryChatConfigBuilder {
    /// Markdown shown when a session starts. Without one the agent is asked
    /// to write a greeting, which costs a model call per session.
    pub fn greeting(mut self, text: impl Into<PromptText>) -> Self {
        self.greeting = Some(text.into());
        self
    }

    pub fn data_description(mut self, text: impl Into<PromptText>) -> Self {
        self.data_description = Some(text.into());
        self
    }

    pub fn extra_instructions(mut self, text: impl Into<PromptText>) -> Self {
        self.extra_instructions = Some(text.into());
        self
    }

    pub fn prompt_template(mut self, text: impl Into<PromptText>) -> Self {
        self.prompt_template = Some(text.into());
        self
    }

    /// Use this prompt verbatim; description, instructions and template are ignored.
    pub fn system_prompt_override(mut self, text: impl Into<PromptText>) -> Self {
        self.system_prompt_override = Some(text.into());
        self
    }

    pub fn categorical_threshold(mut self, threshold: usize) -> Self {
        self.categorical_threshold = threshold;
        self
    }

    pub fn preview_max_rows(mut self, rows: usize) -> Self {
        self.preview_max_rows = rows;
        self
    }

    pub fn max_tool_calls_per_turn(mut self, calls: usize) -> Self {
        self.max_tool_calls_per_turn = calls;
        self
    }

    pub fn agent_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Box<dyn Agent> + Send + Sync + 'static,
    {
        self.agent_factory = Some(Arc::new(factory));
        self
    }

    /// Resolve text inputs and render the system prompt.
    pub fn build(self) -> Result<QueryChatConfig> {
        if self.preview_max_rows == 0 {
            return Err(TabulaError::Config(
                "preview_max_rows must be at least 1".to_string(),
            ));
        }
        if self.max_tool_calls_per_turn == 0 {
            return Err(TabulaError::Config(
                "max_tool_calls_per_turn must be at least 1".to_string(),
            ));
        }

        let greeting = resolve(&self.greeting)?;
        if greeting.is_none() {
            warn!(
                "No greeting provided; the agent will be asked to write one at the start of \
                 every session. Configure a greeting for faster, cheaper and repeatable startup."
            );
        }

        let system_prompt = match resolve(&self.system_prompt_override)? {
            Some(text) => text,
            None => {
                let data_description = resolve(&self.data_description)?;
                let extra_instructions = resolve(&self.extra_instructions)?;
                let template = resolve(&self.prompt_template)?;
                prompt::system_prompt(
                    self.source.as_ref(),
                    self.categorical_threshold,
                    PromptInputs {
                        data_description: data_description.as_deref(),
                        extra_instructions: extra_instructions.as_deref(),
                        template: template.as_deref(),
                    },
                )?
            }
        };

        info!(
            table = ?self.source.table_name(),
            engine = self.source.db_engine(),
            "Query chat configured"
        );

        Ok(QueryChatConfig {
            source: self.source,
            system_prompt,
            greeting,
            preview_max_rows: self.preview_max_rows,
            max_tool_calls_per_turn: self.max_tool_calls_per_turn,
            agent_factory: self.agent_factory,
        })
    }
}

fn resolve(text: &Option<PromptText>) -> Result<Option<String>> {
    text.as_ref().map(PromptText::resolve).transpose()
}

// =============================================================================
// Session
// =============================================================================

/// One conversation over a data source.
///
/// Readers may query the committed state at any time, including while a
/// turn is running.
pub struct QuerySession {
    id: Uuid,
    source: Arc<dyn DataSource>,
    state: Arc<SessionState>,
    transcript: Arc<Transcript>,
    tools: ToolRegistry,
    agent: Arc<Mutex<Box<dyn Agent>>>,
    turn: TurnStateMachine,
    greeting: Option<String>,
    max_tool_calls_per_turn: usize,
}

impl QuerySession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The underlying agent. Locking it waits for any running turn.
    pub fn agent(&self) -> Arc<Mutex<Box<dyn Agent>>> {
        Arc::clone(&self.agent)
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Committed SQL; empty when no filter is active.
    pub fn sql(&self) -> String {
        self.state.sql()
    }

    pub fn title(&self) -> Option<String> {
        self.state.title()
    }

    pub fn state(&self) -> QueryState {
        self.state.snapshot()
    }

    /// The current view: unfiltered data, or the committed query re-run.
    pub fn data(&self) -> Result<Table> {
        self.state.current_result(self.source.as_ref())
    }

    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn.current()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Show the greeting, asking the agent for one when none is configured.
    pub async fn start(&self) -> std::result::Result<(), ChatError> {
        match self.greeting.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                self.transcript.push_message(text);
                Ok(())
            }
            Some(_) => Ok(()),
            None => self.run_turn(GREETING_REQUEST, false).await,
        }
    }

    /// Run one user turn to completion.
    pub async fn send(&self, text: &str) -> std::result::Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.run_turn(text, true).await
    }

    async fn run_turn(&self, input: &str, echo: bool) -> std::result::Result<(), ChatError> {
        let mut agent = self.agent.lock().await;

        // A turn whose future was dropped leaves the machine mid-turn.
        if self.turn.current() != TurnState::Idle {
            self.turn.reset();
        }
        if echo {
            self.transcript.push_user(input);
        }
        self.turn.transition(TurnState::AwaitingAgent)?;

        let result = self.drive(agent.as_mut(), input).await;
        if let Err(ref e) = result {
            warn!(session = %self.id, error = %e, "Turn failed");
            self.transcript.push_error(&e.to_string());
            self.turn.reset();
        }
        result
    }

    async fn drive(&self, agent: &mut dyn Agent, input: &str) -> std::result::Result<(), ChatError> {
        agent.begin_turn(input).await?;

        let mut tool_calls = 0;
        while let Some(event) = agent.next_event().await? {
            match event {
                AgentEvent::Text(fragment) => {
                    self.turn.enter(TurnState::StreamingReply)?;
                    self.transcript.push_fragment(&fragment);
                }
                AgentEvent::ToolCall {
                    id,
                    name,
                    arguments,
                } => {
                    tool_calls += 1;
                    if tool_calls > self.max_tool_calls_per_turn {
                        return Err(ChatError::ToolBudgetExceeded(self.max_tool_calls_per_turn));
                    }
                    self.turn.transition(TurnState::ToolInvoked)?;

                    let outcome = match self.tools.invoke(&name, arguments).await {
                        Ok(value) => ToolOutcome::Success(value),
                        Err(e) => {
                            debug!(tool = %name, error = %e, "Tool call failed");
                            ToolOutcome::Error(e.to_string())
                        }
                    };
                    agent.submit_tool_result(&id, outcome).await?;
                    self.turn.transition(TurnState::AwaitingAgent)?;
                }
            }
        }

        self.turn.transition(TurnState::Idle)
    }

    /// Hand the current view to an analytical layer.
    ///
    /// An active query is passed as SQL (after copying the source table into
    /// the layer if the layer lacks it). Otherwise the source table is
    /// referenced by name when the layer has it, or the data is materialized
    /// as `tabula_data`.
    pub fn export<L: AnalyticalLayer>(&self, layer: &L) -> std::result::Result<L::Relation, ChatError> {
        let relation = match self.state.snapshot() {
            QueryState::Active { sql, .. } => {
                if let Some(name) = self.source.table_name() {
                    if !layer.has_table(name)? {
                        let data = self.unfiltered_for_export()?;
                        layer.create_table(name, &data)?;
                    }
                }
                layer.sql(&sql)?
            }
            QueryState::Unset => {
                let by_name = match self.source.table_name() {
                    Some(name) if layer.has_table(name)? => Some(layer.table(name)?),
                    _ => None,
                };
                match by_name {
                    Some(relation) => relation,
                    None => {
                        let data = self.unfiltered_for_export()?;
                        layer.create_table(EXPORT_TABLE_NAME, &data)?
                    }
                }
            }
        };
        debug!(session = %self.id, "Exported current view");
        Ok(relation)
    }

    fn unfiltered_for_export(&self) -> Result<Table> {
        self.source.unfiltered_data().map_err(|e| {
            TabulaError::ExportUnavailable(format!(
                "no active query and the data source is unavailable: {}",
                e
            ))
        })
    }
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("id", &self.id)
            .field("table", &self.source.table_name())
            .field("state", &self.state.snapshot())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
