//! Conversation log data model.
//!
//! A conversation is an ordered, append-only sequence of [`Turn`]s. Every
//! workflow stage reads an immutable snapshot of the log and returns the
//! turns it wants appended; only the engine appends.

pub mod thread;

pub use thread::{Checkpoint, Thread, ThreadId, ThreadSummary, thread_name_for};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::WorkflowError;

/// Who produced a turn. Downstream stages interpret content by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Router,
    Refiner,
    Generator,
    Checker,
    Final,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::Router => "router",
            Origin::Refiner => "refiner",
            Origin::Generator => "generator",
            Origin::Checker => "checker",
            Origin::Final => "final",
        }
    }

    /// Chat role used when replaying the turn to a model or a chat UI.
    pub fn chat_role(&self) -> &'static str {
        match self {
            Origin::User => "user",
            _ => "assistant",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Origin::User),
            "router" => Ok(Origin::Router),
            "refiner" => Ok(Origin::Refiner),
            "generator" => Ok(Origin::Generator),
            "checker" => Ok(Origin::Checker),
            "final" => Ok(Origin::Final),
            _ => anyhow::bail!("Unknown turn origin '{}'", s),
        }
    }
}

/// One attributed entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub origin: Origin,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(origin: Origin, content: impl Into<String>) -> Self {
        Self {
            origin,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Origin::User, content)
    }
}

/// Ordered, append-only sequence of turns. The first turn is always a user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Turn>", into = "Vec<Turn>")]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// Start a log from the originating request.
    pub fn new(request: Turn) -> Result<Self, WorkflowError> {
        Self::from_turns(vec![request])
    }

    /// Rebuild a log from stored turns, checking the first-turn invariant.
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self, WorkflowError> {
        match turns.first() {
            Some(first) if first.origin == Origin::User => Ok(Self { turns }),
            _ => Err(WorkflowError::MissingUserTurn),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The originating request.
    pub fn first(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn last(&self) -> &Turn {
        &self.turns[self.turns.len() - 1]
    }

    /// Index of the most recent turn with the given origin.
    pub fn latest_index(&self, origin: Origin) -> Option<usize> {
        self.turns.iter().rposition(|t| t.origin == origin)
    }

    /// The most recent turn with the given origin.
    pub fn latest(&self, origin: Origin) -> Option<&Turn> {
        self.latest_index(origin).map(|i| &self.turns[i])
    }

    pub(crate) fn append(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
    }
}

impl TryFrom<Vec<Turn>> for ConversationLog {
    type Error = WorkflowError;

    fn try_from(turns: Vec<Turn>) -> Result<Self, Self::Error> {
        Self::from_turns(turns)
    }
}

impl From<ConversationLog> for Vec<Turn> {
    fn from(log: ConversationLog) -> Self {
        log.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> ConversationLog {
        let mut log = ConversationLog::new(Turn::user("make a button")).unwrap();
        log.append([
            Turn::new(Origin::Router, "clear request"),
            Turn::new(Origin::Generator, "```html\n<button>hi</button>\n```"),
            Turn::new(Origin::Checker, "awaiting review"),
            Turn::user("make it red"),
        ]);
        log
    }

    #[test]
    fn test_log_requires_user_first() {
        let err = ConversationLog::from_turns(vec![Turn::new(Origin::Router, "x")]).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingUserTurn));
        assert!(ConversationLog::from_turns(Vec::new()).is_err());
    }

    #[test]
    fn test_latest_by_origin() {
        let log = sample_log();
        assert_eq!(log.latest(Origin::User).unwrap().content, "make it red");
        assert_eq!(log.latest_index(Origin::Generator), Some(2));
        assert!(log.latest(Origin::Final).is_none());
        assert_eq!(log.first().content, "make a button");
        assert_eq!(log.last().origin, Origin::User);
    }

    #[test]
    fn test_append_is_monotonic_and_preserves_prefix() {
        let log = sample_log();
        let before = log.clone();
        let mut after = log;
        after.append([Turn::new(Origin::Router, "needs changes")]);
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after.turns()[..before.len()], before.turns());
    }

    #[test]
    fn test_origin_roundtrip_through_str() {
        for origin in [
            Origin::User,
            Origin::Router,
            Origin::Refiner,
            Origin::Generator,
            Origin::Checker,
            Origin::Final,
        ] {
            assert_eq!(origin.as_str().parse::<Origin>().unwrap(), origin);
        }
        assert!("supervisor".parse::<Origin>().is_err());
    }

    #[test]
    fn test_log_deserialize_rejects_non_user_first() {
        let json = r#"[{"origin":"router","content":"x","created_at":"2026-01-01T00:00:00Z"}]"#;
        assert!(serde_json::from_str::<ConversationLog>(json).is_err());
    }
}
