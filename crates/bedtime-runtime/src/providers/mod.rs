//! LLM providers for story generation.
//!
//! This module defines the trait every model backend implements, plus
//! implementations for Anthropic and OpenAI-compatible chat endpoints.
//!
//! ## Failure classification
//!
//! Providers map HTTP failures onto [`ProviderError`] so callers can tell
//! authentication problems, rate limits (with their `retry-after` hint) and
//! server errors apart. Transient failures are retried a bounded number of
//! times before surfacing.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(any(feature = "anthropic", feature = "openai"))]
mod http;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory};

/// Retries after the first attempt for transient failures.
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Errors from LLM providers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// HTTP 429 or quota/billing exhaustion.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Server-suggested wait before retrying, when one was sent.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Worth retrying immediately: network errors, timeouts and 5xx.
    ///
    /// Rate limits are not retried in-process; the breaker and the caller's
    /// `retry_after` handling deal with them.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(_) | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Map a non-success HTTP response onto a [`ProviderError`].
#[cfg(any(feature = "anthropic", feature = "openai", test))]
pub(crate) fn classify_failure(
    status: u16,
    retry_after: Option<Duration>,
    message: String,
) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthError,
        429 => ProviderError::RateLimited { retry_after },
        _ if mentions_quota(&message) => ProviderError::RateLimited { retry_after },
        _ => ProviderError::ApiError { status, message },
    }
}

/// Quota and billing errors are rate limits in disguise.
#[cfg(any(feature = "anthropic", feature = "openai", test))]
fn mentions_quota(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["quota", "billing", "rate limit", "rate_limit"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Pull `error.message` out of a JSON error body, or return the raw text.
#[cfg(any(feature = "anthropic", feature = "openai", test))]
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

/// Configuration for a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1200,
            temperature: 0.8,
            timeout: Duration::from_secs(20),
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// The model stopped because it ran out of tokens.
    pub fn was_truncated(&self) -> bool {
        matches!(self.stop_reason.as_deref(), Some("max_tokens") | Some("length"))
    }
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// Only the story agent calls this; the fallback storyteller never does.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;

    /// Estimate tokens for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // ~4 chars per token
        (text.len() / 4) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        assert_eq!(ChatMessage::system("Be kind.").role, "system");
        assert_eq!(ChatMessage::user("A story please").role, "user");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_classify_auth() {
        assert_eq!(
            classify_failure(401, None, "bad key".into()),
            ProviderError::AuthError
        );
        assert_eq!(
            classify_failure(403, None, "forbidden".into()),
            ProviderError::AuthError
        );
    }

    #[test]
    fn test_classify_rate_limit_keeps_hint() {
        let err = classify_failure(429, Some(Duration::from_secs(7)), String::new());
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_quota_wording() {
        let err = classify_failure(
            400,
            None,
            "You exceeded your current quota, please check your plan and billing details.".into(),
        );
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let err = classify_failure(503, None, "overloaded".into());
        assert!(matches!(err, ProviderError::ApiError { status: 503, .. }));
        assert!(err.is_transient());
        assert!(!classify_failure(400, None, "bad request".into()).is_transient());
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error": {"type": "x", "message": "Overloaded"}}"#),
            "Overloaded"
        );
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_truncation_detection() {
        let response = CompletionResponse {
            content: "Once".into(),
            usage: TokenUsage::default(),
            model: "m".into(),
            stop_reason: Some("length".into()),
        };
        assert!(response.was_truncated());
    }
}
