//! Story agent trait and its error type.

use async_trait::async_trait;
use bedtime_core::{Story, StoryRequest};
use std::time::Duration;
use thiserror::Error;

use crate::providers::ProviderError;

/// Errors from story agents.
///
/// These never reach callers of the orchestrator: the breaker logs them,
/// counts them and serves the fallback story instead.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model returned an empty story")]
    EmptyStory,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl AgentError {
    /// Rate-limit hint from the provider, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AgentError::Provider(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Writes a story for a validated request.
#[async_trait]
pub trait StoryAgent: Send + Sync {
    /// Write a story. The request has already been validated.
    async fn write_story(&self, request: &StoryRequest) -> Result<Story, AgentError>;

    /// Name for logs.
    fn name(&self) -> &str;
}
