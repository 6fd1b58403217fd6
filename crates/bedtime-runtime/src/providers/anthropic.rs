//! Anthropic Messages API provider.
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! `x-api-key` header is set.

use super::{
    factory::ProviderFactory,
    http,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
    DEFAULT_MAX_RETRIES,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    max_retries: usize,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    /// Read `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")
            .map(Self::with_credential)
    }

    /// Build from a provider `config` block.
    ///
    /// Recognized keys: `api_key` (falls back to `ANTHROPIC_API_KEY`),
    /// `base_url`, `max_retries`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let mut provider = Self::with_credential(credential);
        if let Some(url) = config["base_url"].as_str() {
            provider = provider.with_base_url(url);
        }
        if let Some(retries) = config["max_retries"].as_u64() {
            provider = provider.with_max_retries(retries as usize);
        }
        Ok(provider)
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn send_once(
        &self,
        request: &MessagesRequest,
        config: &CompletionConfig,
    ) -> Result<MessagesResponse, ProviderError> {
        let builder = http::client()
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION);

        http::post_json(builder, request, config.timeout).await
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

impl MessagesRequest {
    /// Anthropic takes the system prompt as a top-level field rather than a
    /// message. Multiple system messages are joined.
    fn build(messages: Vec<ChatMessage>, config: &CompletionConfig) -> Self {
        let (system, turns): (Vec<ChatMessage>, Vec<ChatMessage>) =
            messages.into_iter().partition(|m| m.role == "system");

        let system = (!system.is_empty()).then(|| {
            system
                .into_iter()
                .map(|m| m.content)
                .collect::<Vec<_>>()
                .join("\n\n")
        });

        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system,
            messages: turns,
            temperature: config.temperature.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<MessagesResponse> for CompletionResponse {
    fn from(body: MessagesResponse) -> Self {
        CompletionResponse {
            content: body
                .content
                .into_iter()
                .filter_map(|block| block.text)
                .collect::<String>(),
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = MessagesRequest::build(messages, config);
        let request = &request;

        let body = http::with_retry(self.name(), self.max_retries, move || {
            self.send_once(request, config)
        })
        .await?;

        Ok(body.into())
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for `provider.type: anthropic`.
///
/// ```yaml
/// provider:
///   type: anthropic
///   config:
///     api_key: sk-ant-...   # optional, falls back to ANTHROPIC_API_KEY
///     base_url: https://... # optional
///     max_retries: 2        # optional
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {}",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        super::factory::validate_base_url(config)
    }

    fn default_model(&self) -> &'static str {
        "claude-haiku-4-5"
    }

    fn description(&self) -> &'static str {
        "Anthropic Messages API"
    }
}
