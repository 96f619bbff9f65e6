//! Request types shared by providers
//!
//! A pipeline stage talks to a provider with exactly one request shape:
//! model, token budget, temperature, system prompt and one user message.

use serde::{Deserialize, Serialize};

/// A single text-generation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Overrides the provider's configured model when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub system_prompt: String,
    pub user_message: String,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            temperature: 0.7,
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Rough size of the prompt, for logging
    pub fn prompt_chars(&self) -> usize {
        self.system_prompt.len() + self.user_message.len()
    }
}

/// Client-side request budget a provider enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests_per_minute: usize,
}
