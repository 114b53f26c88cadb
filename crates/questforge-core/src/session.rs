//! Session state types.
//!
//! A session's world model is a mapping of string keys to arbitrary JSON
//! values; its log is append-only; its version counts committed turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The mutable world model: string keys to scalar/list/mapping values.
pub type StateMap = Map<String, Value>;

/// Who produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    /// A raw player action, recorded verbatim.
    Player,
    /// Narrative text from the generator (or the opening scene).
    Narrative,
}

/// One entry in a session's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Player action or narrative text.
    pub kind: LogEntryKind,
    /// The acting member, for player entries.
    pub member_id: Option<Uuid>,
    /// The entry text.
    pub text: String,
    /// When the entry was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl LogEntry {
    /// Builds a player-action entry.
    #[must_use]
    pub fn player(member_id: Uuid, text: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: LogEntryKind::Player,
            member_id: Some(member_id),
            text: text.into(),
            occurred_at,
        }
    }

    /// Builds a narrative entry.
    #[must_use]
    pub fn narrative(text: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: LogEntryKind::Narrative,
            member_id: None,
            text: text.into(),
            occurred_at,
        }
    }
}

/// The complete durable record of one session.
///
/// Persisted atomically: every committed turn replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The mutable world model.
    pub state: StateMap,
    /// Append-only narrative/player log, in order.
    pub log: Vec<LogEntry>,
    /// The currently valid next moves; fully replaced each committed turn.
    pub available_actions: Vec<String>,
    /// Monotonic commit counter. 1 once the opening scene is committed.
    pub version: u64,
    /// Plot-point descriptions already satisfied, in completion order.
    pub completed_plot_points: Vec<String>,
    /// Consecutive turn attempts without a newly satisfied plot point.
    pub turns_since_progress: u32,
    /// Terminal once true; the session is read-only afterwards.
    pub concluded: bool,
}

/// A read-only view of a session served to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Version the view was taken at.
    pub version: u64,
    /// The world model at that version.
    pub state: StateMap,
    /// The full log at that version.
    pub log: Vec<LogEntry>,
    /// The valid next moves at that version.
    pub available_actions: Vec<String>,
}

/// Raw token counts consumed by one generator call.
///
/// Passed through to the accounting collaborator untouched; the engine does
/// no cost arithmetic of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the generator's input.
    pub prompt_tokens: u32,
    /// Tokens in the generator's output.
    pub completion_tokens: u32,
}
