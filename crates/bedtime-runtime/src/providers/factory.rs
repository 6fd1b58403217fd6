//! Provider registration by type name.
//!
//! The runtime config names a provider (`provider.type`) and passes it an
//! opaque JSON `config` block. Factories turn that pair into a live
//! [`LlmProvider`].
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("openai", &serde_json::json!({}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Builds providers of one type from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Identifier used in `provider.type`, e.g. "anthropic".
    fn provider_type(&self) -> &'static str;

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check configuration without creating a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    /// Model used when the runtime config does not name one that suits this
    /// provider.
    fn default_model(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "LLM provider"
    }
}

/// Shared `base_url` check for HTTP providers.
#[cfg(any(feature = "anthropic", feature = "openai", test))]
pub(crate) fn validate_base_url(config: &JsonValue) -> Result<(), ProviderError> {
    match config["base_url"].as_str() {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            Err(ProviderError::NotConfigured(format!(
                "base_url must start with http:// or https://, got '{}'",
                url
            )))
        }
        _ => Ok(()),
    }
}

/// Registry of provider factories keyed by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every provider compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    /// Register a factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(config)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    pub fn default_model(&self, provider_type: &str) -> Option<&'static str> {
        self.factories.get(provider_type).map(|f| f.default_model())
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            let name = config["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            validate_base_url(config)
        }

        fn default_model(&self) -> &'static str {
            "echo-1"
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        assert!(registry.has_provider("echo"));
        assert_eq!(registry.default_model("echo"), Some("echo-1"));

        let provider = registry
            .create("echo", &serde_json::json!({"name": "night-echo"}))
            .unwrap();
        assert_eq!(provider.name(), "night-echo");
    }

    #[test]
    fn test_unknown_type_lists_available() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        let err = match registry.create("llama", &serde_json::json!({})) {
            Err(e) => e,
            Ok(provider) => panic!("expected an error, got provider {}", provider.name()),
        };
        let message = err.to_string();
        assert!(message.contains("llama"));
        assert!(message.contains("echo"));
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url(&serde_json::json!({})).is_ok());
        assert!(validate_base_url(&serde_json::json!({"base_url": "https://x"})).is_ok());
        assert!(validate_base_url(&serde_json::json!({"base_url": "x.com"})).is_err());

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));
        assert!(registry
            .validate("echo", &serde_json::json!({"base_url": "nope"}))
            .is_err());
    }

    #[cfg(all(feature = "anthropic", feature = "openai"))]
    #[test]
    fn test_defaults_include_hosted_providers() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.available_types(), vec!["anthropic", "openai"]);
    }
}
