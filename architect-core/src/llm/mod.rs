//! LLM client boundary
//!
//! A provider turns one `CompletionRequest` into raw text. Everything that
//! interprets that text lives in `crate::pipeline`.

pub mod claude;
pub mod errors;
pub mod mock;
pub mod traits;
pub mod types;

pub use claude::{ClaudeConfig, ClaudeProvider};
pub use errors::LLMError;
pub use traits::{LLMProvider, RetryableProvider};
pub use types::{CompletionRequest, RateLimit};
