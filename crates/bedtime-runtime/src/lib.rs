//! # bedtime-runtime
//!
//! Resilient, cached story generation on top of `bedtime-core`.
//!
//! A story request goes through:
//! - a cache lookup keyed by [`StoryKey`](bedtime_core::StoryKey)
//! - an LLM story agent guarded by a [`CircuitBreaker`] and a timeout
//! - a template storyteller when the agent fails or the circuit is open
//!
//! Callers only see an error for invalid input or an internal defect.
//! Model outages, rate limits and cache outages all still produce a story.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bedtime_runtime::{ProviderRegistry, RuntimeConfig, StoryOrchestrator};
//! use bedtime_core::{Gender, StoryRequest};
//!
//! let config = RuntimeConfig::from_file("bedtime.yaml")?;
//! let orchestrator = StoryOrchestrator::from_config(config, &ProviderRegistry::with_defaults())?;
//!
//! let request = StoryRequest::new("Emma", ["space"], "adventure", Gender::Girl);
//! let result = orchestrator.generate(&request).await?;
//! println!("{}", result.story);
//! ```
//!
//! ## Features
//!
//! - `anthropic`: Anthropic Messages API provider
//! - `openai`: OpenAI-compatible chat completions provider
//! - `all-providers`: both

pub mod agents;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use agents::{AgentError, LlmStoryAgent, StoryAgent};
pub use cache::{CacheError, MemoryStoryCache, StoryCache};
pub use config::{ConfigError, RuntimeConfig};
pub use orchestrator::{StoryError, StoryOrchestrator, StoryOrchestratorBuilder};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, UsageTracker};
