//! Default values shared by the config loader, the server and the CLI.

pub mod defaults {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_BIND: &str = "127.0.0.1";

    /// Tool-loop steps per chat turn.
    pub const MAX_STEPS: u32 = 5;
    pub const MAX_TOKENS: u32 = 4096;

    /// Daily user-message allowance per account kind.
    pub const GUEST_MESSAGES_PER_DAY: u32 = 20;
    pub const REGULAR_MESSAGES_PER_DAY: u32 = 100;

    /// Trimmed utterances shorter than this never reach the classifier.
    pub const MEMORY_MIN_CHARS: usize = 5;
    /// Classifier fallback: longer utterances count as memorable.
    pub const MEMORY_FALLBACK_CHARS: usize = 10;
    /// Hard limit on stored memory content.
    pub const MEMORY_CONTENT_MAX_CHARS: usize = 200;

    /// Seconds within which a finished assistant message is replayed on resume.
    pub const RESUME_WINDOW_SECS: i64 = 15;

    pub const DATABASE_FILE: &str = "dhruv.db";
}
