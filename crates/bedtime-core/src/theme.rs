//! Story themes.
//!
//! Theme identifiers are free-form strings; the ones listed here get a
//! tailored prompt description and fallback sentence. Anything else falls
//! back to [`GENERIC`].

/// Prompt and template text for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Identifier as sent by clients
    pub id: &'static str,

    /// Title fragment ("the Great Adventure")
    pub title: &'static str,

    /// Guidance for the LLM prompt
    pub description: &'static str,

    /// Sentence used by the template storyteller. `{name}` is substituted.
    pub sentence: &'static str,
}

/// Used for theme identifiers with no dedicated entry.
pub const GENERIC: Theme = Theme {
    id: "bedtime",
    title: "the Sleepy Star",
    description: "a gentle, cozy bedtime tale with a warm and reassuring ending",
    sentence: "The night felt soft and kind, as if the whole world were whispering goodnight to {name}.",
};

const THEMES: &[Theme] = &[
    Theme {
        id: "adventure",
        title: "the Great Adventure",
        description: "an exciting but never scary adventure with a brave discovery",
        sentence: "A winding path appeared at the edge of the garden, and {name} knew an adventure was waiting.",
    },
    Theme {
        id: "friendship",
        title: "the New Friend",
        description: "a heartwarming story about kindness, sharing and making a new friend",
        sentence: "Sitting all alone on a bench was someone who looked like they needed a friend, and {name} went to say hello.",
    },
    Theme {
        id: "magic",
        title: "the Secret Spell",
        description: "a whimsical tale of gentle magic, sparkles and wonder",
        sentence: "When {name} whispered the secret word, tiny golden sparkles danced through the air.",
    },
    Theme {
        id: "space",
        title: "the Shooting Star",
        description: "a calm journey among the stars, planets and friendly moons",
        sentence: "A little silver rocket landed softly on the lawn and opened its round door for {name}.",
    },
    Theme {
        id: "ocean",
        title: "the Singing Sea",
        description: "an underwater journey with friendly sea creatures and shimmering coral",
        sentence: "The waves rolled in with a gentle hush, and a smiling dolphin invited {name} to explore the sea.",
    },
    Theme {
        id: "animals",
        title: "the Forest Friends",
        description: "a playful story with talking animals who help each other",
        sentence: "A fluffy rabbit hopped up to {name} and said, \"We need your help in the forest tonight!\"",
    },
    Theme {
        id: "dreams",
        title: "the Land of Dreams",
        description: "a dreamy, floating journey through a land made of clouds and lullabies",
        sentence: "As {name}'s eyes grew heavy, the bedroom ceiling turned into a sky full of pillowy clouds.",
    },
];

/// Look up a theme by identifier, case-insensitively.
pub fn lookup(id: &str) -> Option<&'static Theme> {
    let id = id.trim();
    THEMES.iter().find(|t| t.id.eq_ignore_ascii_case(id))
}

/// Look up a theme, falling back to [`GENERIC`].
pub fn resolve(id: &str) -> &'static Theme {
    lookup(id).unwrap_or(&GENERIC)
}

/// All known theme identifiers.
pub fn known_ids() -> impl Iterator<Item = &'static str> {
    THEMES.iter().map(|t| t.id)
}

impl Theme {
    /// Fallback sentence with the child's name filled in.
    pub fn sentence_for(&self, name: &str) -> String {
        self.sentence.replace("{name}", name)
    }
}
