//! Assembles the chat system prompt from the persona and per-request context.

use chrono::NaiveDate;
use dhruv_store::UserProfile;
use serde::{Deserialize, Serialize};

use super::persona::COACH_PERSONA;

/// Where the request came from, as reported by the client or edge proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestHints {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl RequestHints {
    pub fn to_prompt(&self) -> String {
        let field = |v: &Option<String>| v.as_deref().unwrap_or_default().to_string();
        format!(
            "About the origin of user's request:\n- lat: {}\n- lon: {}\n- city: {}\n- country: {}\n",
            field(&self.latitude),
            field(&self.longitude),
            field(&self.city),
            field(&self.country),
        )
    }
}

/// Profile fields surfaced to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDetails {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub dietary_preference: Option<String>,
    pub medical_conditions: Vec<String>,
    pub food_liking: Vec<String>,
    pub food_disliking: Vec<String>,
}

impl UserDetails {
    /// Age is computed from the date of birth as of `today`.
    pub fn from_profile(profile: &UserProfile, today: NaiveDate) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            age: profile.age_on(today),
            weight: profile.weight.clone(),
            height: profile.height.clone(),
            dietary_preference: profile.dietary_preference.clone(),
            medical_conditions: profile.medical_conditions.clone(),
            food_liking: profile.food_liking.clone(),
            food_disliking: profile.food_disliking.clone(),
        }
    }

    pub fn to_prompt(&self) -> String {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        format!(
            "User details:\n\
             - First Name: {}\n\
             - Last Name: {}\n\
             - Age: {}\n\
             - Weight: {}\n\
             - Height: {}\n\
             - Dietary Preference: {}\n\
             - Medical Conditions: {}\n\
             - Food Likings : {}\n\
             - Food Dislikings : {}\n",
            text(&self.first_name),
            text(&self.last_name),
            self.age.map(|a| a.to_string()).unwrap_or_default(),
            text(&self.weight),
            text(&self.height),
            text(&self.dietary_preference),
            self.medical_conditions.join(", "),
            self.food_liking.join(", "),
            self.food_disliking.join(", "),
        )
    }
}

/// Builder for the chat system prompt. Sections are joined with blank lines.
///
/// ```rust,ignore
/// let prompt = SystemPromptBuilder::new()
///     .with_hints(hints)
///     .with_user_details(details)
///     .with_custom_prompt(user.prompt.as_deref())
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemPromptBuilder {
    hints: RequestHints,
    details: Option<UserDetails>,
    custom_prompt: Option<String>,
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hints(mut self, hints: RequestHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_user_details(mut self, details: UserDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// A blank prompt is ignored.
    pub fn with_custom_prompt(mut self, prompt: Option<&str>) -> Self {
        self.custom_prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);
        self
    }

    pub fn build(&self) -> String {
        let mut sections = vec![COACH_PERSONA.to_string(), self.hints.to_prompt()];
        if let Some(details) = &self.details {
            sections.push(details.to_prompt());
        }
        if let Some(custom) = &self.custom_prompt {
            sections.push(format!("Additional instructions from the user:\n{custom}"));
        }
        sections.join("\n\n")
    }
}
