//! Anthropic Claude provider implementation with retry logic and rate limiting

use super::errors::LLMError;
use super::traits::{LLMProvider, RetryableProvider};
use super::types::{CompletionRequest, RateLimit};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window of request start times
#[derive(Debug, Clone)]
struct RequestWindow {
    per_minute: usize,
    started: Arc<Mutex<VecDeque<Instant>>>,
}

impl RequestWindow {
    fn new(per_minute: usize) -> Self {
        Self { per_minute: per_minute.max(1), started: Arc::new(Mutex::new(VecDeque::new())) }
    }

    /// Wait until another request fits in the window, then claim a slot
    async fn acquire(&self) {
        let mut started = self.started.lock().await;
        let now = Instant::now();
        while started.front().is_some_and(|&t| now.duration_since(t) >= WINDOW) {
            started.pop_front();
        }

        if started.len() >= self.per_minute {
            if let Some(&oldest) = started.front() {
                let pause = WINDOW.saturating_sub(now.duration_since(oldest));
                debug!("{} requests in the last minute, pausing {:?}", started.len(), pause);
                sleep(pause).await;
                started.pop_front();
            }
        }

        started.push_back(Instant::now());
    }
}

/// Anthropic Messages API provider
pub struct ClaudeProvider {
    client: Client,
    config: ClaudeConfig,
    window: RequestWindow,
}

impl ClaudeProvider {
    pub fn new(config: ClaudeConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::config(format!("Failed to build HTTP client: {}", e)))?;

        let window = RequestWindow::new(config.max_requests_per_minute);

        Ok(Self { client, config, window })
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    fn api_key(&self) -> Result<String, LLMError> {
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LLMError::auth(format!(
                    "Anthropic API key not found in ${}",
                    self.config.api_key_env
                ))
            })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// One logical call: transient failures are retried with backoff
    async fn create_message_with_retry(&self, request: &MessageRequest) -> Result<String, LLMError> {
        let api_key = self.api_key()?;
        let mut attempt = 0;

        loop {
            self.window.acquire().await;

            match self.create_message_internal(&api_key, request).await {
                Ok(text) => return Ok(text),
                Err(e) if self.should_retry(&e) && attempt < self.max_retries() => {
                    attempt += 1;
                    let backoff = self.retry_delay(attempt, &e);
                    warn!(
                        "Temporary Claude error (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_retries(),
                        backoff,
                        e
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn create_message_internal(
        &self,
        api_key: &str,
        request: &MessageRequest,
    ) -> Result<String, LLMError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(LLMError::rate_limit(body, retry_after));
            }
            return Err(LLMError::api(status.as_u16(), body));
        }

        let body = response.text().await.map_err(|e| self.classify_transport_error(e))?;
        parse_message_response(&body)
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> LLMError {
        if error.is_timeout() {
            LLMError::timeout(Duration::from_secs(self.config.timeout_secs))
        } else {
            LLMError::network(error.to_string())
        }
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn is_available(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LLMError> {
        let body = MessageRequest::from_completion(&request, &self.config.model);

        info!(
            "Claude request: model={}, max_tokens={}, prompt_chars={}",
            body.model,
            body.max_tokens,
            request.prompt_chars()
        );

        let started = Instant::now();
        let text = self.create_message_with_retry(&body).await?;
        debug!("Claude answered {} chars in {:?}", text.len(), started.elapsed());

        Ok(text)
    }

    fn rate_limits(&self) -> Option<RateLimit> {
        Some(RateLimit { requests_per_minute: self.config.max_requests_per_minute })
    }
}

impl RetryableProvider for ClaudeProvider {
    fn max_retries(&self) -> usize {
        self.config.max_retries
    }

    fn initial_retry_delay_ms(&self) -> u64 {
        self.config.initial_retry_delay_ms
    }
}

/// Claude configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClaudeConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub anthropic_version: String,
    pub model: String,
    /// Per-call timeout; expiry surfaces as `LLMError::Timeout`
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_requests_per_minute: usize,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            anthropic_version: "2023-06-01".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            timeout_secs: 300,
            max_retries: 3,
            initial_retry_delay_ms: 1000,
            max_requests_per_minute: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API request
#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

impl MessageRequest {
    fn from_completion(request: &CompletionRequest, default_model: &str) -> Self {
        let system = Some(request.system_prompt.clone()).filter(|s| !s.trim().is_empty());

        Self {
            model: request.model.clone().unwrap_or_else(|| default_model.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user_message.clone(),
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
        }
    }
}

/// Claude API response
#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Content {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Join every text block of a Messages API response body
fn parse_message_response(body: &str) -> Result<String, LLMError> {
    let result: MessageResponse = serde_json::from_str(body)
        .map_err(|e| LLMError::decode(format!("Failed to parse Claude response: {}", e)))?;

    let text: String = result
        .content
        .into_iter()
        .filter_map(|c| match c {
            Content::Text { text } => Some(text),
            Content::Other => None,
        })
        .collect();

    if text.is_empty() {
        return Err(LLMError::EmptyResponse { provider: "claude".to_string() });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let provider = ClaudeProvider::new(ClaudeConfig::default()).unwrap();
        assert_eq!(provider.messages_url(), "https://api.anthropic.com/v1/messages");
        assert_eq!(provider.config().api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_request_body() {
        let request = CompletionRequest::new("You are a CTO.", "Merge these visions")
            .with_max_tokens(8000)
            .with_temperature(0.3);
        let body = MessageRequest::from_completion(&request, "claude-test");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "claude-test");
        assert_eq!(json["max_tokens"], 8000);
        assert_eq!(json["system"], "You are a CTO.");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Merge these visions");
    }

    #[test]
    fn test_request_model_override_and_empty_system() {
        let request = CompletionRequest::new("  ", "hi").with_model("claude-other");
        let body = MessageRequest::from_completion(&request, "claude-test");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "claude-other");
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_parse_message_response() {
        let body = r#"{"id":"msg_1","content":[{"type":"text","text":"Hello "},{"type":"tool_use","id":"x"},{"type":"text","text":"world"}]}"#;
        assert_eq!(parse_message_response(body).unwrap(), "Hello world");

        let empty = r#"{"content":[]}"#;
        assert!(matches!(parse_message_response(empty), Err(LLMError::EmptyResponse { .. })));

        assert!(matches!(parse_message_response("<html>"), Err(LLMError::Decode { .. })));
    }

    #[test]
    fn test_retry_delay_backoff() {
        let provider = ClaudeProvider::new(ClaudeConfig {
            initial_retry_delay_ms: 100,
            ..ClaudeConfig::default()
        })
        .unwrap();

        let err = LLMError::api(503, "overloaded");
        assert_eq!(provider.retry_delay(1, &err), Duration::from_millis(100));
        assert_eq!(provider.retry_delay(2, &err), Duration::from_millis(200));
        assert_eq!(provider.retry_delay(3, &err), Duration::from_millis(400));
        assert_eq!(provider.retry_delay(30, &err), Duration::from_secs(30));

        let limited = LLMError::rate_limit("slow", Some(Duration::from_secs(7)));
        assert_eq!(provider.retry_delay(1, &limited), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let provider = ClaudeProvider::new(ClaudeConfig {
            api_key_env: "ARCHITECT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            ..ClaudeConfig::default()
        })
        .unwrap();

        assert!(!provider.is_available().await);
        let result = provider.complete(CompletionRequest::new("sys", "user")).await;
        assert!(matches!(result, Err(LLMError::Auth { .. })));
    }

    #[tokio::test]
    async fn test_request_window_admits_burst_up_to_limit() {
        let window = RequestWindow::new(3);
        let begin = Instant::now();
        for _ in 0..3 {
            window.acquire().await;
        }
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert_eq!(window.started.lock().await.len(), 3);
    }
}
