//! Prompt assembly for chat turns and titles.

mod builder;
mod persona;
mod title;

pub use builder::{RequestHints, SystemPromptBuilder, UserDetails};
pub use persona::COACH_PERSONA;
pub use title::{TITLE_MAX_CHARS, fallback_title, generate_title};
