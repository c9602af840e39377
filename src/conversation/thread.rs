//! Threads: named conversation logs with a resumable cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ConversationLog, Origin};
use crate::approval::is_final_payload;
use crate::workflow::WorkflowState;

/// Identifier of a thread, e.g. `make_a_button_that_says_1760000000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a name from the first five words of a request plus a timestamp.
    pub fn for_request(request: &str, now: DateTime<Utc>) -> Self {
        Self(thread_name_for(request, now.timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Build a thread name: lowercase first five words, keep `[a-z0-9]`, join with `_`.
///
/// Falls back to `project` when nothing survives sanitizing. Uniqueness
/// comes only from the timestamp suffix.
pub fn thread_name_for(request: &str, timestamp: i64) -> String {
    let lowered = request.to_lowercase();
    let words: Vec<String> = lowered
        .split_whitespace()
        .take(5)
        .map(|w| {
            w.chars()
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let stem = if words.is_empty() {
        "project".to_string()
    } else {
        words.join("_")
    };
    format!("{}_{}", stem, timestamp)
}

/// Persisted execution cursor of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State that runs when the thread is next driven.
    pub next: WorkflowState,
    /// True while the checker waits for human feedback.
    pub awaiting_human: bool,
}

impl Checkpoint {
    pub fn at(next: WorkflowState) -> Self {
        Self {
            next,
            awaiting_human: false,
        }
    }

    pub fn awaiting_human() -> Self {
        Self {
            next: WorkflowState::Checking,
            awaiting_human: true,
        }
    }

    pub fn is_done(&self) -> bool {
        self.next == WorkflowState::Done
    }

    /// `done`, `awaiting_human`, or `interrupted` for a run stopped by a failure.
    pub fn status_label(&self) -> &'static str {
        if self.is_done() {
            "done"
        } else if self.awaiting_human {
            "awaiting_human"
        } else {
            "interrupted"
        }
    }

    /// Where a run continues when a human adds new input.
    ///
    /// A suspended checker resumes at checking; any other position
    /// (finished or interrupted) restarts at routing with the extended log.
    pub fn after_user_input(&self) -> WorkflowState {
        if self.awaiting_human {
            WorkflowState::Checking
        } else {
            WorkflowState::Routing
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::at(WorkflowState::Routing)
    }
}

/// A conversation log plus its cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub log: ConversationLog,
    pub checkpoint: Checkpoint,
}

impl Thread {
    /// Whether the newest turn carries the approval payload.
    pub fn is_approved(&self) -> bool {
        let last = self.log.last();
        last.origin == Origin::Final && is_final_payload(&last.content)
    }
}

/// Listing entry for thread enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub turns: usize,
    pub checkpoint: Checkpoint,
    pub updated_at: DateTime<Utc>,
}
