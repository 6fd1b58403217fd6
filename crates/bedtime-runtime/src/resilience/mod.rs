//! Resilience patterns for bedtime-runtime.
//!
//! This module provides:
//! - Circuit breaker around the story model
//! - Usage accounting (tokens, cache and fallback counters)

mod circuit_breaker;
mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use usage::{GenerationUsage, LlmUsage, Outcome, UsageTracker};
