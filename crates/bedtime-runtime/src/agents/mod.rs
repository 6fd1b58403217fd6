//! Story agents: the primary, model-backed way of writing a story.
//!
//! An agent is allowed to fail. The orchestrator runs it behind the circuit
//! breaker and falls back to a template storyteller when it does.

mod llm;
mod traits;

pub use llm::{LlmStoryAgent, DEFAULT_MAX_STORY_CHARS};
pub use traits::{AgentError, StoryAgent};
