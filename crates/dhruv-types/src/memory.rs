//! User memory enums.

use crate::string_enum;

/// Controlled tag vocabulary offered to the extractor.
pub const MEMORY_TAGS: &[&str] = &[
    "nutrition",
    "fitness",
    "health",
    "sleep",
    "hydration",
    "weight",
    "medical",
    "work",
    "family",
    "hobby",
];

string_enum! {
    /// Category of a remembered fact.
    MemoryType, "memory type", default = General {
        Preference => "preference",
        Goal => "goal",
        Fact => "fact",
        Routine => "routine",
        General => "general",
    }
}

string_enum! {
    /// Where a memory came from.
    MemorySource, "memory source", default = Conversation {
        Conversation => "conversation",
        Profile => "profile",
        Activity => "activity",
        Inference => "inference",
    }
}
