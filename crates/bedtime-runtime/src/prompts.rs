//! Prompts for the story model.
//!
//! The system prompt carries the fixed storytelling rules plus the parts
//! that depend on the request: theme, pronouns and interests. The user
//! prompt is a short instruction naming the child.

use bedtime_core::request::join_natural;
use bedtime_core::{theme, StoryRequest};

use crate::providers::ChatMessage;

/// Storytelling rules shared by every request.
pub const BASE_SYSTEM_PROMPT: &str = r##"
You are a gentle children's storyteller writing personalized bedtime stories.

## Rules
1. The story is read aloud to a child aged 3 to 8 just before sleep
2. Keep it calm. Nothing frightening, violent or sad without a warm resolution
3. The child is the hero of the story and is always referred to by name or by the given pronouns
4. Weave every listed interest into the plot, not just a passing mention
5. End with the child safe, cozy and drifting off to sleep

## Format
- First line: the title, prefixed with "# "
- Then 5 to 8 short paragraphs separated by blank lines
- Put spoken dialogue in double quotes
- No headings, lists or commentary after the story
"##;

/// Build the system prompt for `request`.
pub fn system_prompt(request: &StoryRequest) -> String {
    let pronouns = request.gender.pronouns();
    let interests: Vec<&str> = request.interests().collect();

    format!(
        "{base}\n## This story\n- Theme: {theme}\n- Pronouns for the child: {subject}/{object}/{possessive}\n- Interests: {interests}\n",
        base = BASE_SYSTEM_PROMPT.trim_start(),
        theme = theme_line(request.theme()),
        subject = pronouns.subject,
        object = pronouns.object,
        possessive = pronouns.possessive,
        interests = join_natural(&interests),
    )
}

/// Theme identifier with its guidance. Unknown identifiers are passed
/// through as requested, with the generic guidance attached.
fn theme_line(id: &str) -> String {
    match theme::lookup(id) {
        Some(theme) => format!("{} ({})", theme.id, theme.description),
        None => format!("{} ({})", id.trim().to_lowercase(), theme::GENERIC.description),
    }
}

/// Build the user prompt for `request`.
pub fn user_prompt(request: &StoryRequest, max_story_chars: usize) -> String {
    format!(
        "Please write tonight's bedtime story for {name}. Keep it under {max_story_chars} characters.",
        name = request.name(),
    )
}

/// System and user messages for one completion.
pub fn story_messages(request: &StoryRequest, max_story_chars: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(request)),
        ChatMessage::user(user_prompt(request, max_story_chars)),
    ]
}
