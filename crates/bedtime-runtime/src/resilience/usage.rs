//! Usage accounting for story generation.
//!
//! Tracks LLM token spend and how each request was served (cache, model,
//! or template) so operators can see when the fallback is carrying traffic.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::providers::TokenUsage;

/// Accumulated LLM token usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u64,

    /// Prompt/input tokens
    pub prompt_tokens: u64,

    /// Completion/output tokens
    pub completion_tokens: u64,

    /// Number of LLM calls made
    pub llm_calls: u64,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total());
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    /// Estimate cost for a usage entry.
    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens (input, output)
        let (input_rate, output_rate) = match model {
            m if m.contains("gpt-4o-mini") => (0.15, 0.6),
            m if m.contains("gpt-4o") => (2.5, 10.0),
            m if m.contains("gpt-3.5") => (0.5, 1.5),
            m if m.contains("haiku") => (1.0, 5.0),
            m if m.contains("sonnet") => (3.0, 15.0),
            m if m.contains("opus") => (5.0, 25.0),
            _ => (0.15, 0.6),
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;

        input_cost + output_cost
    }
}

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    CacheHit,
    Primary,
    Fallback,
}

/// Snapshot of usage since start (or the last reset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationUsage {
    pub llm: LlmUsage,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub primary_stories: u64,
    pub fallback_stories: u64,
}

impl GenerationUsage {
    /// Share of generated (non-cached) stories that came from the fallback.
    pub fn fallback_ratio(&self) -> f64 {
        let generated = self.primary_stories + self.fallback_stories;
        if generated == 0 {
            0.0
        } else {
            self.fallback_stories as f64 / generated as f64
        }
    }
}

/// Thread-safe usage tracker shared by the orchestrator and story agents.
#[derive(Debug, Default)]
pub struct UsageTracker {
    llm: RwLock<LlmUsage>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    primary_stories: AtomicU64,
    fallback_stories: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record tokens from one completion.
    pub fn record_llm(&self, usage: &TokenUsage, model: &str) {
        self.llm.write().add(usage, model);
    }

    /// Record how a request was served. A cache miss is implied by
    /// `Primary` and `Fallback`.
    pub fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::CacheHit => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Primary => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
                self.primary_stories.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Fallback => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
                self.fallback_stories.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a failed cache read or write.
    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current usage.
    pub fn snapshot(&self) -> GenerationUsage {
        GenerationUsage {
            llm: self.llm.read().clone(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            primary_stories: self.primary_stories.load(Ordering::Relaxed),
            fallback_stories: self.fallback_stories.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        *self.llm.write() = LlmUsage::default();
        for counter in [
            &self.cache_hits,
            &self.cache_misses,
            &self.cache_errors,
            &self.primary_stories,
            &self.fallback_stories,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
