//! Generated stories and the result envelope returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::request::StoryRequest;

/// Which generator produced a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorySource {
    /// Written by the LLM
    Primary,

    /// Filled in from a local template
    Fallback,
}

impl fmt::Display for StorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorySource::Primary => write!(f, "primary"),
            StorySource::Fallback => write!(f, "fallback"),
        }
    }
}

/// A finished story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,

    /// Paragraphs separated by a blank line
    pub body: String,

    pub source: StorySource,
}

impl Story {
    pub fn new(title: impl Into<String>, body: impl Into<String>, source: StorySource) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            source,
        }
    }

    /// Both title and body carry text.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.body.trim().is_empty()
    }

    /// Paragraphs of the body.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.body.split("\n\n").filter(|p| !p.trim().is_empty())
    }
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "# {}\n\n{}", self.title, self.body)
    }
}

/// The complete answer to a story request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub id: Uuid,

    pub created_at: DateTime<Utc>,

    /// The request, echoed back
    pub request: StoryRequest,

    pub story: Story,

    /// Served from the story cache
    #[serde(default)]
    pub cached: bool,
}

impl GenerationResult {
    /// Wrap a freshly generated story.
    pub fn new(request: StoryRequest, story: Story) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            request,
            story,
            cached: false,
        }
    }

    /// Envelope for a story served from cache. The id and timestamp are
    /// fresh and `request` is the one being answered, not the one that
    /// first produced the story.
    pub fn from_cache(request: StoryRequest, story: Story) -> Self {
        Self {
            cached: true,
            ..Self::new(request, story)
        }
    }
}
