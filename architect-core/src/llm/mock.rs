//! Scripted provider for stage and orchestrator tests

#![cfg(test)]

use super::errors::LLMError;
use super::traits::LLMProvider;
use super::types::CompletionRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Answers are consumed in FIFO order; once the script runs dry every call
/// fails with a network error so a test never hangs on a missing answer.
#[derive(Clone)]
pub struct MockLLMProvider {
    name: String,
    model: String,
    script: Arc<Mutex<VecDeque<Result<String, LLMError>>>>,
    call_history: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider that answers with `responses`, in order
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    /// Queue a text answer
    pub fn push_response(&self, response: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(response.into()));
    }

    /// Queue an error
    pub fn push_error(&self, error: LLMError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Every request seen so far, oldest first
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LLMError> {
        self.call_history.lock().unwrap().push(request);

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::network("mock script exhausted")))
    }
}
