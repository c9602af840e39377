//! OpenAI-compatible chat completion backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionRequest, LanguageModel};
use crate::errors::ModelError;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiCompatible {
    client: reqwest::Client,
    base_url: String,
    api_key_env: String,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatible {
    pub fn new(base_url: impl Into<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key_env: api_key_env.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn body_for(request: &CompletionRequest) -> ChatCompletionBody<'_> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::new("system", request.system.clone()));
    messages.extend(request.messages.iter().cloned());
    ChatCompletionBody {
        model: request.model.as_deref().unwrap_or(DEFAULT_MODEL),
        messages,
    }
}

fn first_choice_text(response: ChatCompletionResponse) -> Result<String, ModelError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ModelError::EmptyResponse)
}

#[async_trait]
impl LanguageModel for OpenAiCompatible {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| ModelError::MissingApiKey(self.api_key_env.clone()))?;

        let body = body_for(&request);
        tracing::debug!(endpoint = %self.endpoint(), model = body.model, "chat completion request");

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        first_choice_text(parsed)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let model = OpenAiCompatible::new("https://api.example.com/v1/", "KEY");
        assert_eq!(model.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_body_puts_system_first_and_defaults_model() {
        let request = CompletionRequest::new("be brief").with_message(ChatMessage::new("user", "hi"));
        let body = body_for(&request);
        assert_eq!(body.model, DEFAULT_MODEL);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[0].content, "be brief");
        assert_eq!(body.messages[1].content, "hi");
    }

    #[test]
    fn test_first_choice_text() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  hello "}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(parsed).unwrap(), "hello");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice_text(empty), Err(ModelError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let model = OpenAiCompatible::new("http://127.0.0.1:9", "FRONTSMITH_TEST_UNSET_KEY");
        let err = model
            .complete(CompletionRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey(ref v) if v == "FRONTSMITH_TEST_UNSET_KEY"));
    }
}
