//! Runtime configuration.
//!
//! Loaded from YAML, with every field optional:
//!
//! ```yaml
//! circuit_breaker:
//!   failure_threshold: 3
//!   reset_timeout_ms: 30000
//! cache:
//!   ttl: 24h
//!   max_entries: 10000
//!   cache_fallback_stories: true
//! generation:
//!   timeout: 20s
//!   max_tokens: 1200
//!   max_story_chars: 6000
//!   model: gpt-4o-mini
//!   temperature: 0.8
//! provider:
//!   type: openai
//!   config:
//!     base_url: https://api.openai.com/v1
//! ```
//!
//! A few knobs can be overridden from the environment, see
//! [`RuntimeConfig::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::agents::DEFAULT_MAX_STORY_CHARS;
use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::providers::CompletionConfig;
use crate::resilience::CircuitBreakerConfig;

pub const ENV_FAILURE_THRESHOLD: &str = "BEDTIME_FAILURE_THRESHOLD";
pub const ENV_RESET_TIMEOUT_MS: &str = "BEDTIME_RESET_TIMEOUT_MS";
pub const ENV_CACHE_TTL: &str = "BEDTIME_CACHE_TTL";

/// Errors loading or checking configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the orchestrator and its collaborators need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub generation: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached story
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    pub max_entries: u64,

    /// Whether template stories are cached like model stories
    pub cache_fallback_stories: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entries: DEFAULT_MAX_ENTRIES,
            cache_fallback_stories: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Budget for one primary generation attempt, retries included
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    pub max_tokens: u32,

    /// Polished bodies longer than this are cut at a paragraph or sentence
    pub max_story_chars: usize,

    pub model: String,

    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let completion = CompletionConfig::default();
        Self {
            timeout: completion.timeout,
            max_tokens: completion.max_tokens,
            max_story_chars: DEFAULT_MAX_STORY_CHARS,
            model: completion.model,
            temperature: completion.temperature,
        }
    }
}

impl GenerationConfig {
    /// Per-request completion settings.
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// Which provider to build, and its opaque settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(default = "empty_object")]
    pub config: JsonValue,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl RuntimeConfig {
    /// Parse from YAML and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.generation.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "generation.timeout must be greater than zero".to_string(),
            ));
        }
        if self.generation.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "generation.max_tokens must be at least 1".to_string(),
            ));
        }
        if self.generation.max_story_chars < 200 {
            return Err(ConfigError::Invalid(format!(
                "generation.max_story_chars must be at least 200, got {}",
                self.generation.max_story_chars
            )));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Invalid(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::Invalid("generation.model must not be empty".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if let Some(provider) = &self.provider {
            if provider.provider_type.trim().is_empty() {
                return Err(ConfigError::Invalid("provider.type must not be empty".to_string()));
            }
            if !provider.config.is_object() {
                return Err(ConfigError::Invalid("provider.config must be a mapping".to_string()));
            }
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up through `lookup`, then re-validate.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_FAILURE_THRESHOLD) {
            self.circuit_breaker.failure_threshold = parse_env(ENV_FAILURE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_RESET_TIMEOUT_MS) {
            let millis: u64 = parse_env(ENV_RESET_TIMEOUT_MS, &value)?;
            self.circuit_breaker.reset_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(ENV_CACHE_TTL) {
            self.cache.ttl = humantime::parse_duration(value.trim()).map_err(|e| {
                ConfigError::Invalid(format!("{} = {:?}: {}", ENV_CACHE_TTL, value, e))
            })?;
        }
        self.validate()
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{} = {:?}: {}", name, value, e)))
}

/// Serde adapter for human-readable durations ("30s", "24h").
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
