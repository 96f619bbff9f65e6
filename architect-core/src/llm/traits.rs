//! Provider seam
//!
//! The pipeline only ever needs "send a system prompt and a user message,
//! get raw text back", so the provider surface stays that small.

use super::errors::LLMError;
use super::types::{CompletionRequest, RateLimit};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model used when a request does not name one
    fn model(&self) -> &str;

    /// Whether the provider has what it needs to make calls (e.g. a key)
    async fn is_available(&self) -> bool;

    /// Issue one request and return the raw text of the answer
    async fn complete(&self, request: CompletionRequest) -> Result<String, LLMError>;

    fn rate_limits(&self) -> Option<RateLimit> {
        None
    }
}

/// Backoff policy for providers that retry transient failures themselves
pub trait RetryableProvider: LLMProvider {
    fn max_retries(&self) -> usize {
        3
    }

    fn backoff_factor(&self) -> u32 {
        2
    }

    fn initial_retry_delay_ms(&self) -> u64 {
        1000
    }

    /// Upper bound for a single backoff sleep
    fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn should_retry(&self, error: &LLMError) -> bool {
        error.is_transient()
    }

    /// Delay before retry number `attempt` (1-based)
    ///
    /// A provider-supplied `retry-after` wins over the exponential schedule.
    fn retry_delay(&self, attempt: usize, error: &LLMError) -> Duration {
        if let LLMError::RateLimited { retry_after: Some(after), .. } = error {
            return (*after).min(self.max_retry_delay());
        }

        let mut delay = Duration::from_millis(self.initial_retry_delay_ms());
        for _ in 1..attempt {
            delay = delay.saturating_mul(self.backoff_factor());
        }
        delay.min(self.max_retry_delay())
    }
}
