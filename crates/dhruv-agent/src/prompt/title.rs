//! Chat titles from the opening user message.

use dhruv_llm::{CompletionRequest, Message, SharedBackend};
use tracing::warn;

pub const TITLE_MAX_CHARS: usize = 80;
const TITLE_MAX_TOKENS: u32 = 60;
const UNTITLED: &str = "New chat";

const TITLE_SYSTEM_PROMPT: &str = "You will generate a short title based on the first message a user begins a conversation with. \
Ensure it is not more than 80 characters long. The title should be a summary of the user's message. \
Do not use quotes or colons.";

/// First `TITLE_MAX_CHARS` characters of the message.
pub fn fallback_title(text: &str) -> String {
    let title: String = text.trim().chars().take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .replace(':', "");
    let title: String = title.trim().chars().take(TITLE_MAX_CHARS).collect();
    (!title.is_empty()).then_some(title)
}

/// Ask the title model for a title, falling back to the message prefix.
pub async fn generate_title(backend: &SharedBackend, model: &str, text: &str) -> String {
    let request = CompletionRequest::new(model, vec![Message::user(text)], TITLE_MAX_TOKENS)
        .with_system(TITLE_SYSTEM_PROMPT);

    match backend.complete(request).await {
        Ok(response) => clean_title(&response.text()).unwrap_or_else(|| fallback_title(text)),
        Err(e) => {
            warn!(error = %e, "Title generation failed, using message prefix");
            fallback_title(text)
        }
    }
}
