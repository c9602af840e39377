//! Language-model capability.
//!
//! The workflow only needs "generate text given a prompt". Backends:
//!
//! - [`ClaudeCli`]: pipes the prompt into the `claude --print` subprocess
//! - [`OpenAiCompatible`]: POSTs to a `/chat/completions` endpoint
//! - [`ScriptedModel`]: replays canned responses, used by tests

pub mod claude;
pub mod openai;
pub mod scripted;

pub use claude::ClaudeCli;
pub use openai::OpenAiCompatible;
pub use scripted::ScriptedModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{FrontsmithConfig, ModelBackend};
use crate::conversation::{ConversationLog, Origin, Turn};
use crate::errors::ModelError;

/// One chat message sent to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    /// Replay a turn. Non-user turns keep their origin as a label so the
    /// model can tell the router's reasoning from generated code.
    pub fn from_turn(turn: &Turn) -> Self {
        match turn.origin {
            Origin::User => Self::new("user", turn.content.clone()),
            Origin::Generator | Origin::Final => Self::new("assistant", turn.content.clone()),
            other => Self::new("user", format!("[{}] {}", other, turn.content)),
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Backend model name; `None` uses the backend default.
    pub model: Option<String>,
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            model: None,
            system: system.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Append the whole conversation after the system prompt.
    pub fn with_log(mut self, log: &ConversationLog) -> Self {
        self.messages
            .extend(log.turns().iter().map(ChatMessage::from_turn));
        self
    }

    /// Flatten into one prompt for backends that take plain text.
    pub fn to_transcript(&self) -> String {
        let mut out = String::new();
        out.push_str(self.system.trim());
        out.push_str("\n\n## Conversation\n");
        for message in &self.messages {
            out.push_str(&format!("\n### {}\n{}\n", message.role, message.content));
        }
        out
    }
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Build the backend selected in configuration.
pub fn from_config(config: &FrontsmithConfig) -> Arc<dyn LanguageModel> {
    match config.model_backend() {
        ModelBackend::ClaudeCli => Arc::new(ClaudeCli::new(config.model_command())),
        ModelBackend::OpenAi => Arc::new(OpenAiCompatible::new(
            config.toml.model.base_url.clone(),
            config.toml.model.api_key_env.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_turn_labels_pipeline_turns() {
        let msg = ChatMessage::from_turn(&Turn::new(Origin::Router, "needs detail"));
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "[router] needs detail");

        let msg = ChatMessage::from_turn(&Turn::new(Origin::Generator, "```html```"));
        assert_eq!(msg.role, "assistant");
        assert_eq!(msg.content, "```html```");

        let msg = ChatMessage::from_turn(&Turn::user("hi"));
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "hi");
    }

    #[test]
    fn test_request_with_log_keeps_order() {
        let log = ConversationLog::new(Turn::user("todo app")).unwrap();
        let request = CompletionRequest::new("system").with_log(&log);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "todo app");
    }

    #[test]
    fn test_transcript_contains_system_and_messages() {
        let request = CompletionRequest::new("  You route requests.  ")
            .with_message(ChatMessage::new("user", "a clock"));
        let transcript = request.to_transcript();
        assert!(transcript.starts_with("You route requests."));
        assert!(transcript.contains("### user\na clock"));
    }
}
