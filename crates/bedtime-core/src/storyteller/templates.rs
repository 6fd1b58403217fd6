//! Hand-written story templates.

use crate::request::{capitalize, join_natural, Pronouns};
use crate::theme::Theme;

/// Everything a template can draw on.
pub(crate) struct TemplateContext<'a> {
    pub name: &'a str,
    pub pronouns: Pronouns,
    pub interests: &'a [&'a str],
    pub theme: &'static Theme,
}

impl TemplateContext<'_> {
    fn subj(&self) -> &'static str {
        self.pronouns.subject
    }

    fn subj_cap(&self) -> String {
        self.pronouns.subject_capitalized()
    }

    fn obj(&self) -> &'static str {
        self.pronouns.object
    }

    fn poss(&self) -> &'static str {
        self.pronouns.possessive
    }

    fn was(&self) -> &'static str {
        if self.pronouns.is_plural() {
            "were"
        } else {
            "was"
        }
    }

    fn all_interests(&self) -> String {
        if self.interests.is_empty() {
            return self.first_interest().to_string();
        }
        join_natural(self.interests)
    }

    fn first_interest(&self) -> &str {
        self.interests.first().copied().unwrap_or("bedtime stories")
    }

    /// Second interest if there is one, else the first.
    fn other_interest(&self) -> &str {
        self.interests
            .get(1)
            .copied()
            .unwrap_or_else(|| self.first_interest())
    }

    fn theme_sentence(&self) -> String {
        self.theme.sentence_for(self.name)
    }
}

pub(crate) type Template = fn(&TemplateContext<'_>) -> (String, Vec<String>);

pub(crate) const TEMPLATES: &[Template] = &[cozy_house, sleepless_night, starlit_window];

fn cozy_house(ctx: &TemplateContext<'_>) -> (String, Vec<String>) {
    let title = format!("{} and {}", ctx.name, ctx.theme.title);
    let paragraphs = vec![
        format!(
            "Once upon a time, in a cozy little house at the end of a quiet street, there lived a child named {}. {} loved {} more than anything in the world.",
            ctx.name,
            ctx.subj_cap(),
            ctx.all_interests()
        ),
        ctx.theme_sentence(),
        format!(
            "{} thought about {} the whole way, and that made {} feel brave and happy. Every step was a little bit of magic.",
            ctx.subj_cap(),
            ctx.first_interest(),
            ctx.obj()
        ),
        format!(
            "When the journey was over, {} yawned a big, sleepy yawn. {} snuggled under {} warm blanket, dreaming of {}. Goodnight, {}.",
            ctx.name,
            ctx.subj_cap(),
            ctx.poss(),
            ctx.all_interests(),
            ctx.name
        ),
    ];
    (title, paragraphs)
}

fn sleepless_night(ctx: &TemplateContext<'_>) -> (String, Vec<String>) {
    let title = format!(
        "The Night {} Dreamed of {}",
        ctx.name,
        capitalize(ctx.first_interest())
    );
    let paragraphs = vec![
        format!(
            "{} could never fall asleep without thinking about {}.",
            ctx.name,
            ctx.first_interest()
        ),
        format!("But tonight was different. {}", ctx.theme_sentence()),
        format!(
            "Along the way, {} met new friends who loved {} just as much as {} did. They laughed, they shared stories, and they helped each other whenever the path got tricky.",
            ctx.name,
            ctx.other_interest(),
            ctx.subj()
        ),
        format!(
            "At last, the moon rose high and silver. {} {} tired but happy, and {} heart was full. {} closed {} eyes and drifted off to sleep. The end.",
            ctx.subj_cap(),
            ctx.was(),
            ctx.poss(),
            ctx.name,
            ctx.poss()
        ),
    ];
    (title, paragraphs)
}

fn starlit_window(ctx: &TemplateContext<'_>) -> (String, Vec<String>) {
    let title = format!("{} and the Starlit Wish", ctx.name);
    let paragraphs = vec![
        format!(
            "Every night, the stars peeked through {}'s window to see what {} {} dreaming about. Tonight, it was {}.",
            ctx.name,
            ctx.subj(),
            ctx.was(),
            ctx.all_interests()
        ),
        ctx.theme_sentence(),
        format!(
            "\"I can do this,\" {} whispered, remembering everything {} knew about {}. And {} could!",
            ctx.name,
            ctx.subj(),
            ctx.first_interest(),
            ctx.subj()
        ),
        format!(
            "By the time it was all done, the sky had turned a deep, sleepy blue. {} curled up in bed, smiled, and whispered, \"Goodnight, world.\"",
            ctx.name
        ),
    ];
    (title, paragraphs)
}
