use async_trait::async_trait;
use bedtime_core::{Story, StoryRequest};
use bedtime_runtime::{AgentError, ProviderError, StoryAgent};

/// Agent for runs without a model. Every call fails, so the orchestrator
/// always serves the template storyteller.
pub struct OfflineAgent;

#[async_trait]
impl StoryAgent for OfflineAgent {
    async fn write_story(&self, _request: &StoryRequest) -> Result<Story, AgentError> {
        Err(ProviderError::NotConfigured("offline mode".to_string()).into())
    }

    fn name(&self) -> &str {
        "offline"
    }
}
