//! Deterministic model that replays queued responses in order.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CompletionRequest, LanguageModel};
use crate::errors::ModelError;

/// Test double for [`LanguageModel`]. Each call pops the next queued
/// response and records the request it was given.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of successful responses.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for r in responses {
            model.push(r);
        }
        model
    }

    pub fn push(&self, response: impl Into<String>) -> &Self {
        self.lock_responses().push_back(Ok(response.into()));
        self
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock_responses().push_back(Err(message.into()));
        self
    }

    pub fn remaining(&self) -> usize {
        self.lock_responses().len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        match self.lock_responses().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ModelError::Scripted(message)),
            None => Err(ModelError::ScriptExhausted),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
