//! Story orchestrator.
//!
//! One call to [`StoryOrchestrator::generate`]:
//! 1. Validate the request (before any cache or model access)
//! 2. Look the story up in the cache; a hit is returned as-is
//! 3. On a miss, run the story agent behind the circuit breaker with a
//!    timeout, falling back to the template storyteller
//! 4. Wrap, check and cache the result
//!
//! Cache failures are logged and absorbed. Agent failures are absorbed by
//! the breaker. Only invalid input and internal defects (an incomplete
//! story, a panic anywhere in the pipeline) reach the caller.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use bedtime_core::{
    GenerationResult, Story, StoryKey, StoryRequest, StorySource, Storyteller,
    TemplateStoryteller, ValidationError,
};

use crate::agents::{AgentError, LlmStoryAgent, StoryAgent};
use crate::cache::{MemoryStoryCache, StoryCache};
use crate::config::{GenerationConfig, RuntimeConfig};
use crate::providers::ProviderRegistry;
use crate::resilience::{CircuitBreaker, CircuitState, GenerationUsage, Outcome, UsageTracker};

/// Errors returned to callers of the orchestrator.
#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Invalid story request: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Story generation failed: {cause}")]
    GenerationFailed { cause: String },

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Resilient story generation.
///
/// Cheap to share behind an `Arc`; all state lives in the breaker, the
/// cache and the usage counters.
pub struct StoryOrchestrator {
    agent: Arc<dyn StoryAgent>,
    storyteller: Arc<dyn Storyteller>,
    cache: Arc<dyn StoryCache>,
    breaker: Arc<CircuitBreaker>,
    usage: Arc<UsageTracker>,
    generation_timeout: Duration,
    cache_ttl: Duration,
    cache_fallback_stories: bool,
}

impl StoryOrchestrator {
    pub fn builder() -> StoryOrchestratorBuilder {
        StoryOrchestratorBuilder::default()
    }

    /// Build the full stack from configuration, see
    /// [`StoryOrchestratorBuilder::from_config`].
    pub fn from_config(
        config: RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, StoryError> {
        StoryOrchestratorBuilder::from_config(config, registry)?.build()
    }

    /// Produce a story for `request`.
    ///
    /// Succeeds whenever the request is valid and the pipeline is free of
    /// defects, whether or not the model or the cache are reachable.
    pub async fn generate(&self, request: &StoryRequest) -> Result<GenerationResult, StoryError> {
        request.validate()?;

        AssertUnwindSafe(self.generate_validated(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let cause = panic_message(&*panic);
                tracing::error!(cause = %cause, "Story pipeline panicked");
                Err(StoryError::GenerationFailed { cause })
            })
    }

    async fn generate_validated(
        &self,
        request: &StoryRequest,
    ) -> Result<GenerationResult, StoryError> {
        let key = StoryKey::for_request(request);

        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                self.usage.record_outcome(Outcome::CacheHit);
                tracing::debug!(key = %key, "Story served from cache");
                return Ok(GenerationResult::from_cache(request.clone(), hit.story));
            }
            Ok(None) => {}
            Err(e) => {
                self.usage.record_cache_error();
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
            }
        }

        let key = &key;
        let timeout = self.generation_timeout;
        let story = self
            .breaker
            .execute(
                move || async move {
                    tokio::time::timeout(timeout, self.agent.write_story(request))
                        .await
                        .unwrap_or_else(|_| Err(AgentError::Timeout(timeout)))
                },
                move || std::future::ready(self.fallback_story(key, request)),
            )
            .await;

        let result = GenerationResult::new(request.clone(), story);
        if !result.story.is_complete() {
            return Err(StoryError::GenerationFailed {
                cause: format!("{} story is missing its title or body", result.story.source),
            });
        }

        let source = result.story.source;
        self.usage.record_outcome(match source {
            StorySource::Primary => Outcome::Primary,
            StorySource::Fallback => Outcome::Fallback,
        });
        tracing::debug!(key = %key, source = %source, id = %result.id, "Story generated");

        if source == StorySource::Primary || self.cache_fallback_stories {
            if let Err(e) = self.cache.set(key.clone(), &result, self.cache_ttl).await {
                self.usage.record_cache_error();
                tracing::warn!(key = %key, error = %e, "Cache write failed");
            }
        }

        Ok(result)
    }

    fn fallback_story(&self, key: &StoryKey, request: &StoryRequest) -> Story {
        tracing::warn!(
            key = %key,
            breaker = %self.breaker.state(),
            "Serving fallback story"
        );
        self.storyteller.tell(request)
    }

    /// Current breaker state, without side effects.
    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Usage since start.
    pub fn usage(&self) -> GenerationUsage {
        self.usage.snapshot()
    }
}

impl std::fmt::Debug for StoryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryOrchestrator")
            .field("agent", &self.agent.name())
            .field("breaker", &self.breaker)
            .field("generation_timeout", &self.generation_timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_fallback_stories", &self.cache_fallback_stories)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".to_string())
}

/// Builder for [`StoryOrchestrator`].
///
/// Only the agent is required. Everything else defaults from the
/// [`RuntimeConfig`] (itself defaulted when not given).
#[derive(Default)]
pub struct StoryOrchestratorBuilder {
    config: RuntimeConfig,
    agent: Option<Arc<dyn StoryAgent>>,
    storyteller: Option<Arc<dyn Storyteller>>,
    cache: Option<Arc<dyn StoryCache>>,
    breaker: Option<Arc<CircuitBreaker>>,
    usage: Option<Arc<UsageTracker>>,
}

impl StoryOrchestratorBuilder {
    /// Builder with an [`LlmStoryAgent`] over the provider named in
    /// `config.provider`, created through `registry`.
    ///
    /// The model comes from the provider's `config.model` when set, then
    /// from `generation.model` unless that is still the default, then from
    /// the provider's own default.
    pub fn from_config(
        config: RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, StoryError> {
        let provider_config = config.provider.as_ref().ok_or_else(|| {
            StoryError::NotConfigured("no provider configured".to_string())
        })?;
        let provider_type = provider_config.provider_type.as_str();

        registry
            .validate(provider_type, &provider_config.config)
            .map_err(|e| StoryError::NotConfigured(e.to_string()))?;
        let provider = registry
            .create(provider_type, &provider_config.config)
            .map_err(|e| StoryError::NotConfigured(e.to_string()))?;

        let mut completion = config.generation.completion();
        if let Some(model) = provider_config.config["model"].as_str() {
            completion.model = model.to_string();
        } else if config.generation.model == GenerationConfig::default().model {
            if let Some(model) = registry.default_model(provider_type) {
                completion.model = model.to_string();
            }
        }

        tracing::info!(
            provider = provider.name(),
            model = %completion.model,
            "Story provider configured"
        );

        let usage = Arc::new(UsageTracker::new());
        let agent = LlmStoryAgent::new(provider)
            .with_completion(completion)
            .with_max_story_chars(config.generation.max_story_chars)
            .with_usage(usage.clone());

        Ok(Self::default()
            .config(config)
            .agent(Arc::new(agent))
            .usage(usage))
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agent(mut self, agent: Arc<dyn StoryAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn storyteller(mut self, storyteller: Arc<dyn Storyteller>) -> Self {
        self.storyteller = Some(storyteller);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn StoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share a breaker between orchestrators that call the same model.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn build(self) -> Result<StoryOrchestrator, StoryError> {
        self.config
            .validate()
            .map_err(|e| StoryError::NotConfigured(e.to_string()))?;

        let agent = self
            .agent
            .ok_or_else(|| StoryError::NotConfigured("story agent is required".to_string()))?;
        let config = self.config;

        Ok(StoryOrchestrator {
            agent,
            storyteller: self
                .storyteller
                .unwrap_or_else(|| Arc::new(TemplateStoryteller::new())),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(MemoryStoryCache::new(config.cache.max_entries))),
            breaker: self.breaker.unwrap_or_else(|| {
                Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()))
            }),
            usage: self.usage.unwrap_or_default(),
            generation_timeout: config.generation.timeout,
            cache_ttl: config.cache.ttl,
            cache_fallback_stories: config.cache.cache_fallback_stories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::config::ProviderConfig;
    use bedtime_core::Gender;

    struct Offline;

    #[async_trait]
    impl StoryAgent for Offline {
        async fn write_story(&self, _request: &StoryRequest) -> Result<Story, AgentError> {
            Err(AgentError::EmptyStory)
        }

        fn name(&self) -> &str {
            "offline"
        }
    }

    #[test]
    fn test_builder_requires_agent() {
        assert!(matches!(
            StoryOrchestrator::builder().build(),
            Err(StoryError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = RuntimeConfig::default();
        config.generation.timeout = Duration::ZERO;

        let result = StoryOrchestrator::builder()
            .config(config)
            .agent(Arc::new(Offline))
            .build();
        assert!(matches!(result, Err(StoryError::NotConfigured(_))));
    }

    #[test]
    fn test_from_config_without_provider() {
        let result = StoryOrchestrator::from_config(RuntimeConfig::default(), &ProviderRegistry::new());
        assert!(matches!(result, Err(StoryError::NotConfigured(_))));
    }

    #[test]
    fn test_from_config_with_unknown_provider() {
        let mut config = RuntimeConfig::default();
        config.provider = Some(ProviderConfig {
            provider_type: "llama".to_string(),
            config: serde_json::json!({}),
        });

        match StoryOrchestrator::from_config(config, &ProviderRegistry::new()) {
            Err(StoryError::NotConfigured(message)) => assert!(message.contains("llama")),
            other => panic!("expected NotConfigured, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_offline_serves_templates() {
        let orchestrator = StoryOrchestrator::builder()
            .agent(Arc::new(Offline))
            .storyteller(Arc::new(TemplateStoryteller::seeded(3)))
            .build()
            .unwrap();

        let request = StoryRequest::new("Mia", ["kites"], "friendship", Gender::Girl);
        let result = orchestrator.generate(&request).await.unwrap();

        assert_eq!(result.story.source, StorySource::Fallback);
        assert!(result.story.body.contains("Mia"));
        assert!(!result.cached);
        assert_eq!(orchestrator.usage().fallback_stories, 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "panic with non-string payload");
    }
}
