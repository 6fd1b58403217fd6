//! Model-backed story agent.

use async_trait::async_trait;
use bedtime_core::{polish::polish, Story, StoryRequest};
use std::sync::Arc;

use super::traits::{AgentError, StoryAgent};
use crate::prompts;
use crate::providers::{CompletionConfig, LlmProvider};
use crate::resilience::UsageTracker;

/// Default upper bound on the polished story body.
pub const DEFAULT_MAX_STORY_CHARS: usize = 6000;

/// Writes stories by prompting an [`LlmProvider`] and polishing the output.
pub struct LlmStoryAgent {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    max_story_chars: usize,
    usage: Option<Arc<UsageTracker>>,
}

impl LlmStoryAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            completion: CompletionConfig::default(),
            max_story_chars: DEFAULT_MAX_STORY_CHARS,
            usage: None,
        }
    }

    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_max_story_chars(mut self, max_story_chars: usize) -> Self {
        self.max_story_chars = max_story_chars;
        self
    }

    /// Record token usage into `usage`.
    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn completion(&self) -> &CompletionConfig {
        &self.completion
    }
}

impl std::fmt::Debug for LlmStoryAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmStoryAgent")
            .field("provider", &self.provider.name())
            .field("completion", &self.completion)
            .field("max_story_chars", &self.max_story_chars)
            .finish()
    }
}

#[async_trait]
impl StoryAgent for LlmStoryAgent {
    async fn write_story(&self, request: &StoryRequest) -> Result<Story, AgentError> {
        let messages = prompts::story_messages(request, self.max_story_chars);
        let response = self.provider.complete(messages, &self.completion).await?;

        if let Some(usage) = &self.usage {
            usage.record_llm(&response.usage, &response.model);
        }

        if response.was_truncated() {
            tracing::debug!(
                provider = self.provider.name(),
                max_tokens = self.completion.max_tokens,
                "Completion hit the token limit"
            );
        }

        if response.content.trim().is_empty() {
            return Err(AgentError::EmptyStory);
        }

        let story = polish(&response.content, request, self.max_story_chars);
        if !story.is_complete() {
            return Err(AgentError::EmptyStory);
        }

        Ok(story)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}
