//! Failures of a single provider call

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    /// No usable API key, or the provider rejected it
    #[error("Authentication with the provider failed: {message}")]
    Auth { message: String },

    #[error("Provider rate limit hit ({message}), retry after {retry_after:?}")]
    RateLimited { message: String, retry_after: Option<Duration> },

    #[error("Provider call exceeded {duration:?}")]
    Timeout { duration: Duration },

    #[error("Could not reach the provider: {message}")]
    Network { message: String },

    /// Non-success HTTP status with the body as returned
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid provider configuration: {message}")]
    Config { message: String },

    /// The response envelope (not the model's text) could not be decoded
    #[error("Unreadable provider response: {message}")]
    Decode { message: String },

    #[error("Provider '{provider}' returned no text content")]
    EmptyResponse { provider: String },
}

impl LLMError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited { message: message.into(), retry_after }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api { status, body: body.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    /// HTTP status carried by the error, if the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}
