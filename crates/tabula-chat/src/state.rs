//! Session and turn state.
//!
//! [`SessionState`] holds the committed query:
//! - Unset -> Active (a commit succeeds)
//! - Active -> Active (a later commit succeeds)
//! - Active -> Unset (a blank commit clears the filter)
//!
//! [`TurnStateMachine`] tracks where a conversation turn is:
//! - Idle -> AwaitingAgent (turn starts)
//! - AwaitingAgent -> ToolInvoked | StreamingReply | Idle
//! - ToolInvoked -> AwaitingAgent (outcome submitted)
//! - StreamingReply -> ToolInvoked | Idle

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use tabula_core::error::Result;
use tabula_core::types::Table;
use tabula_source::DataSource;

use crate::error::ChatError;

// =============================================================================
// Committed query
// =============================================================================

/// The committed query of a session.
///
/// A title only ever exists alongside the SQL it describes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryState {
    /// No filter; readers see the unfiltered data.
    #[default]
    Unset,
    Active { sql: String, title: String },
}

impl QueryState {
    /// The committed SQL, or the empty string when unset.
    pub fn sql(&self) -> &str {
        match self {
            QueryState::Unset => "",
            QueryState::Active { sql, .. } => sql,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            QueryState::Unset => None,
            QueryState::Active { title, .. } => Some(title),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, QueryState::Active { .. })
    }
}

/// Shared, atomically replaced query state.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<QueryState>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // The state is replaced in a single assignment, so a poisoned lock still
    // guards a whole value.
    fn read(&self) -> RwLockReadGuard<'_, QueryState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, QueryState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> QueryState {
        self.read().clone()
    }

    pub fn sql(&self) -> String {
        self.read().sql().to_string()
    }

    pub fn title(&self) -> Option<String> {
        self.read().title().map(str::to_string)
    }

    /// Replace the committed pair.
    pub fn commit(&self, sql: impl Into<String>, title: impl Into<String>) {
        let next = QueryState::Active {
            sql: sql.into(),
            title: title.into(),
        };
        *self.write() = next;
    }

    /// Drop the filter.
    pub fn clear(&self) {
        *self.write() = QueryState::Unset;
    }

    /// Materialize the current view of `source`.
    ///
    /// Recomputed on every call. The lock is released before the backend runs.
    pub fn current_result(&self, source: &dyn DataSource) -> Result<Table> {
        match self.snapshot() {
            QueryState::Unset => source.unfiltered_data(),
            QueryState::Active { sql, .. } => source.execute(&sql),
        }
    }
}

// =============================================================================
// Turn state machine
// =============================================================================

/// Where the current conversation turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnState {
    /// No turn in progress.
    #[default]
    Idle,
    /// Waiting for the agent's next event.
    AwaitingAgent,
    /// A tool call is running.
    ToolInvoked,
    /// Reply text is arriving.
    StreamingReply,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "Idle"),
            TurnState::AwaitingAgent => write!(f, "AwaitingAgent"),
            TurnState::ToolInvoked => write!(f, "ToolInvoked"),
            TurnState::StreamingReply => write!(f, "StreamingReply"),
        }
    }
}

impl TurnState {
    pub fn can_transition_to(&self, target: &TurnState) -> bool {
        matches!(
            (self, target),
            (TurnState::Idle, TurnState::AwaitingAgent)
                | (TurnState::AwaitingAgent, TurnState::ToolInvoked)
                | (TurnState::AwaitingAgent, TurnState::StreamingReply)
                | (TurnState::AwaitingAgent, TurnState::Idle)
                | (TurnState::ToolInvoked, TurnState::AwaitingAgent)
                | (TurnState::StreamingReply, TurnState::ToolInvoked)
                | (TurnState::StreamingReply, TurnState::Idle)
        )
    }
}

/// Validated turn state transitions.
#[derive(Debug, Default)]
pub struct TurnStateMachine {
    state: Mutex<TurnState>,
}

impl TurnStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> TurnState {
        *self.lock()
    }

    pub fn transition(&self, target: TurnState) -> std::result::Result<(), ChatError> {
        let mut state = self.lock();
        if state.can_transition_to(&target) {
            debug!("Turn state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(ChatError::InvalidTransition(*state, target))
        }
    }

    /// Move to `target` unless already there.
    pub fn enter(&self, target: TurnState) -> std::result::Result<(), ChatError> {
        if self.current() == target {
            return Ok(());
        }
        self.transition(target)
    }

    /// Force the machine back to Idle (interrupted or failed turns).
    pub fn reset(&self) {
        let mut state = self.lock();
        warn!("Turn state machine reset to Idle from {}", *state);
        *state = TurnState::Idle;
    }
}
