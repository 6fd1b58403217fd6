//! Story requests and their validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest child name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 64;

/// Most interests accepted in one request.
pub const MAX_INTERESTS: usize = 10;

/// Errors raised when a request fails shape validation.
///
/// Validation runs before any cache or network access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("childName is required")]
    MissingChildName,

    #[error("childName must be at most {max} characters (got {len})")]
    NameTooLong { len: usize, max: usize },

    #[error("at least one interest is required")]
    NoInterests,

    #[error("at most {max} interests are allowed (got {count})")]
    TooManyInterests { count: usize, max: usize },

    #[error("theme is required")]
    MissingTheme,
}

/// Which pronoun set the story uses for the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Boy,
    Girl,
    #[default]
    Neutral,
}

impl Gender {
    /// Pronouns used when writing about the child.
    pub fn pronouns(&self) -> Pronouns {
        match self {
            Gender::Boy => Pronouns {
                subject: "he",
                object: "him",
                possessive: "his",
            },
            Gender::Girl => Pronouns {
                subject: "she",
                object: "her",
                possessive: "her",
            },
            Gender::Neutral => Pronouns {
                subject: "they",
                object: "them",
                possessive: "their",
            },
        }
    }

    /// Stable lowercase identifier, as used on the wire and in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Boy => "boy",
            Gender::Girl => "girl",
            Gender::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boy" => Ok(Gender::Boy),
            "girl" => Ok(Gender::Girl),
            "neutral" => Ok(Gender::Neutral),
            other => Err(format!(
                "unknown gender '{}': expected boy, girl or neutral",
                other
            )),
        }
    }
}

/// Subject/object/possessive pronoun set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pronouns {
    pub subject: &'static str,
    pub object: &'static str,
    pub possessive: &'static str,
}

impl Pronouns {
    /// Subject pronoun with the first letter capitalized, for sentence starts.
    pub fn subject_capitalized(&self) -> String {
        capitalize(self.subject)
    }

    /// "they" takes plural verb forms.
    pub fn is_plural(&self) -> bool {
        self.subject == "they"
    }
}

/// A request for a personalized bedtime story.
///
/// Field names follow the JSON body accepted by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    /// Name of the child the story is about
    pub child_name: String,

    /// Things the child likes (dragons, trains, ...)
    pub interests: Vec<String>,

    /// Theme identifier (e.g. "adventure", "space")
    pub theme: String,

    /// Pronoun category
    #[serde(default)]
    pub gender: Gender,
}

impl StoryRequest {
    /// Create a new request.
    pub fn new(
        child_name: impl Into<String>,
        interests: impl IntoIterator<Item = impl Into<String>>,
        theme: impl Into<String>,
        gender: Gender,
    ) -> Self {
        Self {
            child_name: child_name.into(),
            interests: interests.into_iter().map(Into::into).collect(),
            theme: theme.into(),
            gender,
        }
    }

    /// Check the request shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.child_name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingChildName);
        }

        let len = name.chars().count();
        if len > MAX_NAME_CHARS {
            return Err(ValidationError::NameTooLong {
                len,
                max: MAX_NAME_CHARS,
            });
        }

        let count = self.interests().count();
        if count == 0 {
            return Err(ValidationError::NoInterests);
        }
        if count > MAX_INTERESTS {
            return Err(ValidationError::TooManyInterests {
                count,
                max: MAX_INTERESTS,
            });
        }

        if self.theme.trim().is_empty() {
            return Err(ValidationError::MissingTheme);
        }

        Ok(())
    }

    /// Child name without surrounding whitespace.
    pub fn name(&self) -> &str {
        self.child_name.trim()
    }

    /// Non-blank interests, trimmed, in request order.
    pub fn interests(&self) -> impl Iterator<Item = &str> {
        self.interests
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
    }

    /// Theme identifier without surrounding whitespace.
    pub fn theme(&self) -> &str {
        self.theme.trim()
    }
}

/// Join items as natural English: "a", "a and b", "a, b and c".
pub fn join_natural<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head = init
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} and {}", head, last.as_ref())
        }
    }
}

/// Uppercase the first character.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
