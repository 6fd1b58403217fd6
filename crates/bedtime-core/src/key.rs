//! Cache key fingerprint for story requests.
//!
//! Two requests that ask for the same story map to the same key,
//! regardless of interest ordering, letter case or stray whitespace.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::request::StoryRequest;

const PREFIX: &str = "story";
const FIELD_SEP: char = ':';
const LIST_SEP: char = ',';
const ESCAPE: char = '%';

/// Deterministic fingerprint of a [`StoryRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryKey(String);

impl StoryKey {
    /// Compute the key for a request.
    ///
    /// Layout: `story:{name}:{interests}:{theme}:{gender}` with every
    /// component trimmed and lowercased, `%`, `:` and `,` percent-escaped,
    /// and interests sorted and deduplicated.
    pub fn for_request(request: &StoryRequest) -> Self {
        let mut interests: Vec<String> = request.interests().map(normalize).collect();
        interests.sort();
        interests.dedup();

        let key = format!(
            "{prefix}{sep}{name}{sep}{interests}{sep}{theme}{sep}{gender}",
            prefix = PREFIX,
            sep = FIELD_SEP,
            name = normalize(request.name()),
            interests = interests.join(&LIST_SEP.to_string()),
            theme = normalize(request.theme()),
            gender = request.gender.as_str(),
        );

        Self(key)
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&StoryRequest> for StoryKey {
    fn from(request: &StoryRequest) -> Self {
        Self::for_request(request)
    }
}

/// Lowercase and collapse internal whitespace, then percent-escape the
/// separators (and `%` itself) so distinct components never share a key.
fn normalize(value: &str) -> String {
    let folded = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut escaped = String::with_capacity(folded.len());
    for c in folded.chars() {
        match c {
            ESCAPE => escaped.push_str("%25"),
            FIELD_SEP => escaped.push_str("%3A"),
            LIST_SEP => escaped.push_str("%2C"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Gender;
    use proptest::prelude::*;

    #[test]
    fn test_key_layout() {
        let req = StoryRequest::new("Emma", ["space", "Dragons"], "adventure", Gender::Girl);
        assert_eq!(
            StoryKey::for_request(&req).as_str(),
            "story:emma:dragons,space:adventure:girl"
        );
    }

    #[test]
    fn test_order_and_case_insensitive() {
        let a = StoryRequest::new("Emma", ["dragons", "space"], "adventure", Gender::Girl);
        let b = StoryRequest::new(" emma ", ["Space ", "dragons"], "Adventure", Gender::Girl);
        assert_eq!(StoryKey::from(&a), StoryKey::from(&b));
    }

    #[test]
    fn test_gender_distinguishes() {
        let a = StoryRequest::new("Sam", ["boats"], "ocean", Gender::Boy);
        let b = StoryRequest::new("Sam", ["boats"], "ocean", Gender::Neutral);
        assert_ne!(StoryKey::from(&a), StoryKey::from(&b));
    }

    #[test]
    fn test_separators_cannot_collide() {
        let a = StoryRequest::new("a:b", ["c"], "d", Gender::Boy);
        let b = StoryRequest::new("a", ["b:c"], "d", Gender::Boy);
        assert_ne!(StoryKey::from(&a), StoryKey::from(&b));
    }

    #[test]
    fn test_escaped_separators_differ_from_lookalikes() {
        let colon = StoryRequest::new("a:b", ["x"], "space", Gender::Boy);
        let underscore = StoryRequest::new("a_b", ["x"], "space", Gender::Boy);
        assert_ne!(StoryKey::from(&colon), StoryKey::from(&underscore));
        assert_eq!(StoryKey::from(&colon).as_str(), "story:a%3Ab:x:space:boy");

        let comma = StoryRequest::new("Kai", ["cars,trains"], "space", Gender::Boy);
        let pair = StoryRequest::new("Kai", ["cars", "trains"], "space", Gender::Boy);
        assert_ne!(StoryKey::from(&comma), StoryKey::from(&pair));

        let literal = StoryRequest::new("a%3Ab", ["x"], "space", Gender::Boy);
        assert_ne!(StoryKey::from(&colon), StoryKey::from(&literal));
    }

    proptest! {
        #[test]
        fn prop_distinct_names_get_distinct_keys(
            a in "[a-z:,%_]{1,8}",
            b in "[a-z:,%_]{1,8}",
        ) {
            prop_assume!(a != b);
            let first = StoryRequest::new(a, ["x"], "space", Gender::Girl);
            let second = StoryRequest::new(b, ["x"], "space", Gender::Girl);
            prop_assert_ne!(StoryKey::from(&first), StoryKey::from(&second));
        }

        #[test]
        fn prop_interest_order_does_not_matter(
            name in "[A-Za-z]{1,12}",
            theme in "[a-z]{1,10}",
            mut interests in prop::collection::vec("[a-z ]{1,10}", 1..6),
        ) {
            let original = StoryRequest::new(name.clone(), interests.clone(), theme.clone(), Gender::Neutral);
            interests.reverse();
            let reversed = StoryRequest::new(name, interests, theme, Gender::Neutral);
            prop_assert_eq!(StoryKey::from(&original), StoryKey::from(&reversed));
        }
    }
}
