//! Conversational query mediation for Tabula.
//!
//! Exposes a data source to a language-model agent as two tools (commit a
//! filter, preview a query), keeps the committed SQL and title consistent
//! across tool calls and concurrent readers, and drives the agent's turns
//! while recording everything shown to the user in a transcript.

pub mod agent;
pub mod error;
pub mod export;
pub mod prompt;
pub mod render;
pub mod session;
pub mod state;
pub mod tool;
pub mod tools;
pub mod transcript;

pub use agent::{Agent, AgentEvent, AgentFactory, ToolOutcome};
pub use error::{ChatError, ToolError};
pub use export::{AnalyticalLayer, LazyRelation, SqliteLayer};
pub use session::{QueryChatConfig, QueryChatConfigBuilder, QuerySession};
pub use state::{QueryState, SessionState, TurnState, TurnStateMachine};
pub use tool::{Tool, ToolDefinition, ToolRegistry};
pub use transcript::{EntryKind, Role, Transcript, TranscriptEntry};
