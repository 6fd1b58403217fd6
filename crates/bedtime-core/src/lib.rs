//! # bedtime-core
//!
//! Deterministic building blocks for personalized bedtime stories.
//!
//! This crate answers the questions that need no network:
//! - Is this story request well formed?
//! - Which cache key does it map to?
//! - How does raw model output become a presentable story?
//! - What story do we tell when the model is unavailable?
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: nothing here touches the network or disk
//! 2. **Stable keys**: semantically identical requests share a [`StoryKey`]
//! 3. **Infallible fallback**: [`TemplateStoryteller`] always produces a complete story
//!
//! ## Example
//!
//! ```rust
//! use bedtime_core::{Gender, StoryKey, StoryRequest, Storyteller, TemplateStoryteller};
//!
//! let request = StoryRequest::new("Emma", ["space", "dragons"], "adventure", Gender::Girl);
//! request.validate().unwrap();
//!
//! assert_eq!(
//!     StoryKey::for_request(&request).as_str(),
//!     "story:emma:dragons,space:adventure:girl"
//! );
//!
//! let story = TemplateStoryteller::seeded(1).tell(&request);
//! assert!(story.body.contains("Emma"));
//! ```

pub mod key;
pub mod polish;
pub mod request;
pub mod story;
pub mod storyteller;
pub mod theme;

pub use key::StoryKey;
pub use request::{Gender, Pronouns, StoryRequest, ValidationError};
pub use story::{GenerationResult, Story, StorySource};
pub use storyteller::{Storyteller, TemplateStoryteller};
pub use theme::Theme;
