//! Row types for every table plus the insert and update shapes.
//!
//! Everything serializes camelCase; these structs are what the HTTP layer and
//! the tools hand back to clients.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use dhruv_types::{
    CalorieSource, ChatRole, MealType, MemorySource, MemoryType, UserKind, Visibility, WaterSource,
    WaterUnit,
};

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// An account and its onboarding profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub kind: UserKind,
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Free-form instructions appended to the system prompt.
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Personal details collected by the onboarding form. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub mobile_number: Option<String>,
    pub dietary_preference: Option<String>,
    pub medical_conditions: Vec<String>,
    pub food_liking: Vec<String>,
    pub food_disliking: Vec<String>,
    pub fitness_goal: Option<String>,
    pub activity_level: Option<String>,
    pub gender: Option<String>,
}

impl UserProfile {
    /// Age in whole years on `today`, if the date of birth parses.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth.as_deref()?.trim();
        let dob = NaiveDate::parse_from_str(dob, "%Y-%m-%d").ok()?;
        today.years_since(dob)
    }
}

/// Partial edit of the onboarding profile, as submitted by the form.
///
/// The outer `Option` is whether the key was sent at all: absent keys leave
/// the stored column alone, an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub date_of_birth: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub weight: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub height: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub mobile_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub dietary_preference: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub medical_conditions: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub food_liking: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub food_disliking: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub fitness_goal: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub activity_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub gender: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fold the sent keys into `profile`. A cleared list becomes empty.
    pub fn apply_to(self, profile: &mut UserProfile) {
        fn set<T>(slot: &mut Option<T>, value: Option<Option<T>>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_list(slot: &mut Vec<String>, value: Option<Option<Vec<String>>>) {
            if let Some(value) = value {
                *slot = value.unwrap_or_default();
            }
        }

        set(&mut profile.first_name, self.first_name);
        set(&mut profile.last_name, self.last_name);
        set(&mut profile.date_of_birth, self.date_of_birth);
        set(&mut profile.weight, self.weight);
        set(&mut profile.height, self.height);
        set(&mut profile.mobile_number, self.mobile_number);
        set(&mut profile.dietary_preference, self.dietary_preference);
        set_list(&mut profile.medical_conditions, self.medical_conditions);
        set_list(&mut profile.food_liking, self.food_liking);
        set_list(&mut profile.food_disliking, self.food_disliking);
        set(&mut profile.fitness_goal, self.fitness_goal);
        set(&mut profile.activity_level, self.activity_level);
        set(&mut profile.gender, self.gender);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chats
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: Uuid, user_id: Uuid, title: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            id,
            user_id,
            title: title.into(),
            visibility,
            created_at: Utc::now().trunc_subsecs(3),
        }
    }
}

/// A persisted chat message. `parts` and `attachments` are client-shaped JSON
/// arrays stored as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: ChatRole,
    pub parts: serde_json::Value,
    pub attachments: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(id: Uuid, chat_id: Uuid, role: ChatRole, parts: serde_json::Value) -> Self {
        Self {
            id,
            chat_id,
            role,
            parts,
            attachments: serde_json::Value::Array(Vec::new()),
            created_at: Utc::now().trunc_subsecs(3),
        }
    }

    pub fn with_attachments(mut self, attachments: serde_json::Value) -> Self {
        self.attachments = attachments;
        self
    }

    /// Text parts joined with a single space.
    pub fn text(&self) -> String {
        let Some(parts) = self.parts.as_array() else {
            return String::new();
        };
        parts
            .iter()
            .filter(|p| p.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Intake Logs
// ─────────────────────────────────────────────────────────────────────────────

/// A water log to insert. `consumed_at` defaults to the insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWaterIntake {
    pub amount: f64,
    pub unit: WaterUnit,
    pub consumed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: WaterSource,
}

impl NewWaterIntake {
    pub fn new(amount: f64, unit: WaterUnit) -> Self {
        Self {
            amount,
            unit,
            consumed_at: None,
            notes: None,
            source: WaterSource::default(),
        }
    }

    pub fn consumed_at(mut self, at: DateTime<Utc>) -> Self {
        self.consumed_at = Some(at);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_source(mut self, source: WaterSource) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaterIntake {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub unit: WaterUnit,
    pub consumed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub source: WaterSource,
}

/// A calorie log to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalorieIntake {
    pub calories: f64,
    pub food_item: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub meal_type: MealType,
    pub carbs: f64,
    pub proteins: f64,
    pub fats: f64,
    pub consumed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: CalorieSource,
}

impl NewCalorieIntake {
    pub fn new(
        food_item: impl Into<String>,
        calories: f64,
        carbs: f64,
        proteins: f64,
        fats: f64,
    ) -> Self {
        Self {
            calories,
            food_item: food_item.into(),
            quantity: None,
            unit: None,
            meal_type: MealType::default(),
            carbs,
            proteins,
            fats,
            consumed_at: None,
            notes: None,
            source: CalorieSource::default(),
        }
    }

    pub fn with_meal_type(mut self, meal_type: MealType) -> Self {
        self.meal_type = meal_type;
        self
    }

    pub fn consumed_at(mut self, at: DateTime<Utc>) -> Self {
        self.consumed_at = Some(at);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalorieIntake {
    pub id: Uuid,
    pub user_id: Uuid,
    pub calories: f64,
    pub food_item: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub meal_type: MealType,
    pub carbs: f64,
    pub proteins: f64,
    pub fats: f64,
    pub consumed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub source: CalorieSource,
}

/// Calories and entry count for one meal type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MealCalories {
    pub calories: f64,
    pub entries: usize,
}

/// Water totals per logged unit, in that unit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct WaterByUnit {
    pub ml: f64,
    pub oz: f64,
}

/// Totals for one IST calendar day. All amounts are rounded to 2 decimals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyIntakeSummary {
    pub calorie_amount: f64,
    /// Total water in millilitres, oz entries converted.
    pub water_intake_amount: f64,
    #[serde(rename = "waterIntakeAmountOZ")]
    pub water_intake_amount_oz: f64,
    pub carbs_amount: f64,
    pub proteins_amount: f64,
    pub fats_amount: f64,
    /// `YYYY-MM-DD` in IST.
    pub date: String,
    pub timezone: String,
    pub calorie_entry_count: usize,
    pub water_entry_count: usize,
    /// Keyed by meal type; every meal type is present.
    pub calories_by_meal: BTreeMap<String, MealCalories>,
    pub water_by_unit: WaterByUnit,
}

// ─────────────────────────────────────────────────────────────────────────────
// Memories
// ─────────────────────────────────────────────────────────────────────────────

/// A memory to insert. The store trims and truncates content and clamps the
/// score.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub memory_content: String,
    pub memory_type: MemoryType,
    pub importance_score: i64,
    pub tags: Vec<String>,
    pub source: MemorySource,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            memory_content: content.into(),
            memory_type: MemoryType::default(),
            importance_score: 5,
            tags: Vec::new(),
            source: MemorySource::default(),
        }
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    pub fn with_importance(mut self, score: i64) -> Self {
        self.importance_score = score;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_source(mut self, source: MemorySource) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub memory_content: String,
    pub memory_type: MemoryType,
    /// Always within 1..=10.
    pub importance_score: u8,
    /// `None` when no tags were extracted.
    pub tags: Option<Vec<String>>,
    pub source: MemorySource,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-place edit of a memory. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUpdate {
    pub memory_content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub importance_score: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Listing filter for active memories.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryFilter {
    pub memory_type: Option<MemoryType>,
    pub min_importance: u8,
    pub limit: usize,
}

impl Default for MemoryFilter {
    fn default() -> Self {
        Self {
            memory_type: None,
            min_importance: 1,
            limit: 50,
        }
    }
}
