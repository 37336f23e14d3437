//! Append-only log of everything shown to the user.
//!
//! Entries are numbered in append order. Renderers either take snapshots
//! with [`Transcript::entries`] or follow along through
//! [`Transcript::subscribe`].

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered entries per subscriber before a slow reader starts lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// What an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A complete message (user input or greeting).
    Message,
    /// A streamed piece of an agent reply.
    Fragment,
    /// SQL submitted through a tool.
    SqlBlock,
    /// A backend error raised by a tool.
    ErrorNotice,
    /// HTML preview of a query result.
    ResultTable,
    /// Status text from the session itself.
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub seq: u64,
    pub role: Role,
    pub kind: EntryKind,
    pub text: String,
}

impl TranscriptEntry {
    /// Markdown as it appears in the chat.
    pub fn to_markdown(&self) -> String {
        match self.kind {
            EntryKind::Message => format!("{}\n\n", self.text),
            EntryKind::Fragment => self.text.clone(),
            EntryKind::SqlBlock => format!("\n```sql\n{}\n```\n\n", self.text),
            EntryKind::ErrorNotice => format!("> Error: {}\n\n", self.text),
            EntryKind::ResultTable => format!("{}\n\n", self.text),
            EntryKind::Notice => format!("_{}_\n\n", self.text),
        }
    }
}

/// Ordered, shareable chat log.
#[derive(Debug)]
pub struct Transcript {
    entries: Mutex<Vec<TranscriptEntry>>,
    sender: broadcast::Sender<TranscriptEntry>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(Vec::new()),
            sender,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TranscriptEntry>> {
        // Entries are only ever pushed whole, so a poisoned log is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry and notify subscribers.
    pub fn append(&self, role: Role, kind: EntryKind, text: impl Into<String>) -> TranscriptEntry {
        let mut entries = self.lock();
        let entry = TranscriptEntry {
            seq: entries.len() as u64,
            role,
            kind,
            text: text.into(),
        };
        entries.push(entry.clone());
        // Sending while holding the lock keeps subscriber order equal to seq order.
        let _ = self.sender.send(entry.clone());
        entry
    }

    pub fn push_user(&self, text: &str) -> TranscriptEntry {
        self.append(Role::User, EntryKind::Message, text)
    }

    pub fn push_message(&self, text: &str) -> TranscriptEntry {
        self.append(Role::Assistant, EntryKind::Message, text)
    }

    pub fn push_fragment(&self, text: &str) -> TranscriptEntry {
        self.append(Role::Assistant, EntryKind::Fragment, text)
    }

    pub fn push_sql(&self, sql: &str) -> TranscriptEntry {
        self.append(Role::Assistant, EntryKind::SqlBlock, sql)
    }

    pub fn push_error(&self, message: &str) -> TranscriptEntry {
        self.append(Role::Assistant, EntryKind::ErrorNotice, message)
    }

    pub fn push_table(&self, html: &str) -> TranscriptEntry {
        self.append(Role::Assistant, EntryKind::ResultTable, html)
    }

    pub fn push_notice(&self, text: &str) -> TranscriptEntry {
        self.append(Role::Assistant, EntryKind::Notice, text)
    }

    /// Snapshot of all entries in order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Receive entries appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEntry> {
        self.sender.subscribe()
    }

    /// Concatenated markdown of the assistant's side of the conversation.
    pub fn render_markdown(&self) -> String {
        self.lock()
            .iter()
            .filter(|e| e.role == Role::Assistant)
            .map(TranscriptEntry::to_markdown)
            .collect()
    }
}
