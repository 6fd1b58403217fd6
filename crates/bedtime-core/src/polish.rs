//! Post-processing for LLM story output.
//!
//! Raw completions arrive in whatever shape the model felt like. Polishing
//! guarantees a title, one paragraph per block separated by a blank line,
//! emphasized dialogue and a bounded length.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::request::StoryRequest;
use crate::story::{Story, StorySource};
use crate::theme;

/// Titles longer than this are treated as ordinary text.
const MAX_TITLE_CHARS: usize = 120;

lazy_static! {
    /// Quoted dialogue, straight or curly quotes, with optional emphasis markers around it.
    static ref DIALOGUE_PATTERN: Regex = Regex::new(
        r#"(\*?)(["“])([^"“”\n]+)(["”])(\*?)"#
    ).unwrap();

    /// "Title: ..." prefix.
    static ref TITLE_PREFIX_PATTERN: Regex = Regex::new(r"(?i)^title\s*:\s*").unwrap();

    /// A line that is entirely bold: **...**
    static ref BOLD_LINE_PATTERN: Regex = Regex::new(r"^\*\*(.+)\*\*$").unwrap();
}

/// Turn a raw completion into a [`Story`] for `request`.
///
/// The body is cut to at most `max_body_chars` characters. An empty
/// completion yields an incomplete story (blank body), which callers treat
/// as a failure.
pub fn polish(raw: &str, request: &StoryRequest, max_body_chars: usize) -> Story {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let (title, rest) = extract_title(&text);
    let title = title.unwrap_or_else(|| default_title(request));

    let body = normalize_paragraphs(rest);
    let body = emphasize_dialogue(&body);
    let body = truncate_at_boundary(&body, max_body_chars);

    Story::new(title, body, StorySource::Primary)
}

/// Title derived from the child's name and theme.
pub fn default_title(request: &StoryRequest) -> String {
    let theme = theme::resolve(request.theme());
    format!("{} and {}", request.name(), theme.title)
}

/// Split a leading title line off `text`.
///
/// Recognized forms: `# Title`, `Title: ...`, `**Title**`.
pub fn extract_title(text: &str) -> (Option<String>, &str) {
    let trimmed = text.trim_start();
    let (first, rest) = match trimmed.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest),
        None => (trimmed.trim(), ""),
    };

    let candidate = if first.starts_with('#') {
        Some(first.trim_start_matches('#').trim())
    } else if let Some(m) = TITLE_PREFIX_PATTERN.find(first) {
        Some(first[m.end()..].trim())
    } else {
        BOLD_LINE_PATTERN
            .captures(first)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
    };

    match candidate
        .map(|t| t.trim_matches(|c: char| c == '"' || c == '*').trim())
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_TITLE_CHARS)
    {
        Some(title) => (Some(title.to_string()), rest),
        None => (None, text),
    }
}

/// One paragraph per non-blank line, separated by a single blank line.
pub fn normalize_paragraphs(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Wrap quoted dialogue in `*...*`. Already emphasized dialogue is left alone.
pub fn emphasize_dialogue(text: &str) -> String {
    DIALOGUE_PATTERN
        .replace_all(text, |caps: &Captures| {
            let quote = format!("{}{}{}", &caps[2], &caps[3], &caps[4]);
            if !caps[1].is_empty() && !caps[5].is_empty() {
                format!("*{}*", quote)
            } else {
                format!("{}*{}*{}", &caps[1], quote, &caps[5])
            }
        })
        .into_owned()
}

/// Cut `text` to at most `max_chars` characters, preferring a paragraph
/// break, then a sentence end. A hard cut is marked with an ellipsis.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let prefix = &text[..cut];
    let half = prefix.len() / 2;

    if let Some(pos) = prefix.rfind("\n\n").filter(|&p| p >= half) {
        return prefix[..pos].trim_end().to_string();
    }

    if let Some(pos) = prefix
        .rfind(|c: char| c == '.' || c == '!' || c == '?')
        .filter(|&p| p >= half)
    {
        let end = pos + 1;
        // keep a closing quote/emphasis that belongs to the sentence
        let tail: String = prefix[end..]
            .chars()
            .take_while(|c| matches!(*c, '"' | '”' | '*'))
            .collect();
        return format!("{}{}", &prefix[..end], tail);
    }

    let mut hard = prefix.trim_end().to_string();
    hard.pop();
    hard.push('…');
    hard
}
