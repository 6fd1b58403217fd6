//! Template storyteller.
//!
//! The fallback generator: fills a hand-written template with the child's
//! name, pronouns, interests and a theme sentence. No I/O, never fails.
//!
//! Template choice is random. Use [`TemplateStoryteller::seeded`] when the
//! exact text matters (tests, reproducible CLI output).

mod templates;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::polish::emphasize_dialogue;
use crate::request::StoryRequest;
use crate::story::{Story, StorySource};
use crate::theme;

use templates::{TemplateContext, TEMPLATES};

/// Used when a request reaches the storyteller without a usable name.
const FALLBACK_NAME: &str = "Little One";

/// Produces a story without any network access.
pub trait Storyteller: Send + Sync {
    /// Write a complete story for `request`. Must not fail.
    fn tell(&self, request: &StoryRequest) -> Story;
}

/// Storyteller backed by the built-in templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateStoryteller {
    seed: Option<u64>,
}

impl TemplateStoryteller {
    /// Random template per story.
    pub fn new() -> Self {
        Self::default()
    }

    /// Same template for every story, chosen from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Number of available templates.
    pub fn template_count() -> usize {
        TEMPLATES.len()
    }

    /// Render a specific template. `index` wraps around.
    pub fn render(index: usize, request: &StoryRequest) -> Story {
        let name = match request.name() {
            "" => FALLBACK_NAME,
            name => name,
        };
        let interests: Vec<&str> = request.interests().collect();
        let ctx = TemplateContext {
            name,
            pronouns: request.gender.pronouns(),
            interests: &interests,
            theme: theme::resolve(request.theme()),
        };

        let (title, paragraphs) = TEMPLATES[index % TEMPLATES.len()](&ctx);
        let body = emphasize_dialogue(&paragraphs.join("\n\n"));

        Story::new(title, body, StorySource::Fallback)
    }

    fn pick(&self) -> usize {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..TEMPLATES.len()),
            None => rand::thread_rng().gen_range(0..TEMPLATES.len()),
        }
    }
}

impl Storyteller for TemplateStoryteller {
    fn tell(&self, request: &StoryRequest) -> Story {
        let index = self.pick();
        tracing::debug!(template = index, theme = request.theme(), "Telling template story");
        Self::render(index, request)
    }
}
