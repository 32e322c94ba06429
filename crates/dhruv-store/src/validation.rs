//! Validation for records entering the store.
//!
//! The messages are shown verbatim to the model and the client, so tools and
//! the store share this one set.

use crate::types::{NewCalorieIntake, NewMemory, NewWaterIntake};

/// Longest food item name accepted.
pub const FOOD_ITEM_MAX_CHARS: usize = 128;
/// Longest free-form quantity unit accepted.
pub const UNIT_MAX_CHARS: usize = 32;
/// Longest email accepted.
pub const EMAIL_MAX_CHARS: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Validation Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("User ID is required")]
    MissingUserId,

    #[error("Email is required")]
    MissingEmail,

    #[error("Email too long")]
    EmailTooLong,

    /// Field label is capitalised: "Amount", "Calories", "Carbs", ...
    #[error("{0} must be a positive number")]
    NotPositive(&'static str),

    #[error("Unit must be either 'ml' or 'oz'")]
    InvalidWaterUnit,

    #[error("Food item name is required")]
    MissingFoodItem,

    #[error("Food item name too long")]
    FoodItemTooLong,

    #[error("Unit name too long")]
    UnitTooLong,

    #[error("Meal type must be 'breakfast', 'lunch', 'dinner', or 'snack'")]
    InvalidMealType,

    #[error("Source must be 'manual', 'app', or 'device'")]
    InvalidWaterSource,

    #[error("Source must be 'manual', 'app', or 'barcode'")]
    InvalidCalorieSource,

    #[error("consumedAt must be an RFC 3339 timestamp")]
    InvalidTimestamp,

    #[error("Memory content is required")]
    MissingMemoryContent,

    #[error("Memory type must be 'preference', 'goal', 'fact', 'routine', or 'general'")]
    InvalidMemoryType,

    #[error("Source must be 'conversation', 'profile', 'activity', or 'inference'")]
    InvalidMemorySource,

    #[error("At least one entry is required")]
    NoEntries,

    #[error("At least one memory is required")]
    NoMemories,

    /// Failure inside a bulk calorie insert; `index` is 1-based.
    #[error("Entry {index}: {error}")]
    Entry {
        index: usize,
        error: Box<ValidationError>,
    },

    /// Failure inside a bulk memory insert; `index` is 1-based.
    #[error("Memory {index}: {error}")]
    Memory {
        index: usize,
        error: Box<ValidationError>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Field Checks
// ─────────────────────────────────────────────────────────────────────────────

/// Strictly positive and finite.
pub fn validate_positive(value: f64, label: &'static str) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NotPositive(label))
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    if email.chars().count() > EMAIL_MAX_CHARS {
        return Err(ValidationError::EmailTooLong);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Record Checks
// ─────────────────────────────────────────────────────────────────────────────

pub fn validate_water_intake(entry: &NewWaterIntake) -> Result<(), ValidationError> {
    validate_positive(entry.amount, "Amount")
}

/// Checks run in the order the fields are reported to the model.
pub fn validate_calorie_intake(entry: &NewCalorieIntake) -> Result<(), ValidationError> {
    validate_positive(entry.calories, "Calories")?;

    let food_item = entry.food_item.trim();
    if food_item.is_empty() {
        return Err(ValidationError::MissingFoodItem);
    }
    if food_item.chars().count() > FOOD_ITEM_MAX_CHARS {
        return Err(ValidationError::FoodItemTooLong);
    }

    if let Some(quantity) = entry.quantity {
        validate_positive(quantity, "Quantity")?;
    }
    if let Some(unit) = &entry.unit
        && unit.chars().count() > UNIT_MAX_CHARS
    {
        return Err(ValidationError::UnitTooLong);
    }

    validate_positive(entry.carbs, "Carbs")?;
    validate_positive(entry.proteins, "Proteins")?;
    validate_positive(entry.fats, "Fats")
}

pub fn validate_calorie_batch(entries: &[NewCalorieIntake]) -> Result<(), ValidationError> {
    if entries.is_empty() {
        return Err(ValidationError::NoEntries);
    }
    for (i, entry) in entries.iter().enumerate() {
        validate_calorie_intake(entry).map_err(|error| ValidationError::Entry {
            index: i + 1,
            error: Box::new(error),
        })?;
    }
    Ok(())
}

pub fn validate_memory(memory: &NewMemory) -> Result<(), ValidationError> {
    if memory.memory_content.trim().is_empty() {
        return Err(ValidationError::MissingMemoryContent);
    }
    Ok(())
}

pub fn validate_memory_batch(memories: &[NewMemory]) -> Result<(), ValidationError> {
    if memories.is_empty() {
        return Err(ValidationError::NoMemories);
    }
    for (i, memory) in memories.iter().enumerate() {
        validate_memory(memory).map_err(|error| ValidationError::Memory {
            index: i + 1,
            error: Box::new(error),
        })?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalisation
// ─────────────────────────────────────────────────────────────────────────────

/// Trim and cut to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

/// Clamp an importance score into 1..=10.
pub fn clamp_importance(score: i64) -> u8 {
    score.clamp(1, 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> NewCalorieIntake {
        NewCalorieIntake::new("apple", 95.0, 25.0, 0.5, 0.3)
    }

    #[test]
    fn test_positive_rejects_zero_negative_and_nan() {
        assert!(validate_positive(1.0, "Amount").is_ok());
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                validate_positive(bad, "Amount").unwrap_err().to_string(),
                "Amount must be a positive number"
            );
        }
    }

    #[test]
    fn test_calorie_checks_calories_first() {
        let mut entry = apple();
        entry.calories = -5.0;
        entry.carbs = 0.0;
        assert_eq!(
            validate_calorie_intake(&entry).unwrap_err().to_string(),
            "Calories must be a positive number"
        );
    }

    #[test]
    fn test_calorie_food_item_rules() {
        let mut entry = apple();
        entry.food_item = "   ".into();
        assert_eq!(
            validate_calorie_intake(&entry).unwrap_err(),
            ValidationError::MissingFoodItem
        );

        entry.food_item = "x".repeat(FOOD_ITEM_MAX_CHARS + 1);
        assert_eq!(
            validate_calorie_intake(&entry).unwrap_err().to_string(),
            "Food item name too long"
        );

        entry.food_item = "x".repeat(FOOD_ITEM_MAX_CHARS);
        assert!(validate_calorie_intake(&entry).is_ok());
    }

    #[test]
    fn test_calorie_optional_fields() {
        let mut entry = apple();
        entry.quantity = Some(0.0);
        assert_eq!(
            validate_calorie_intake(&entry).unwrap_err().to_string(),
            "Quantity must be a positive number"
        );

        entry.quantity = Some(1.5);
        entry.unit = Some("u".repeat(UNIT_MAX_CHARS + 1));
        assert_eq!(
            validate_calorie_intake(&entry).unwrap_err().to_string(),
            "Unit name too long"
        );
    }

    #[test]
    fn test_macros_must_be_positive() {
        let mut entry = apple();
        entry.fats = 0.0;
        assert_eq!(
            validate_calorie_intake(&entry).unwrap_err().to_string(),
            "Fats must be a positive number"
        );
    }

    #[test]
    fn test_batch_prefixes_index() {
        let mut bad = apple();
        bad.food_item = String::new();
        let err = validate_calorie_batch(&[apple(), bad]).unwrap_err();
        assert_eq!(err.to_string(), "Entry 2: Food item name is required");

        assert_eq!(
            validate_calorie_batch(&[]).unwrap_err().to_string(),
            "At least one entry is required"
        );
    }

    #[test]
    fn test_memory_batch_prefixes_index() {
        let err = validate_memory_batch(&[NewMemory::new(" ")]).unwrap_err();
        assert_eq!(err.to_string(), "Memory 1: Memory content is required");
        assert_eq!(
            validate_memory_batch(&[]).unwrap_err().to_string(),
            "At least one memory is required"
        );
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "é".repeat(250);
        assert_eq!(truncate_chars(&text, 200).chars().count(), 200);
        assert_eq!(truncate_chars("  short  ", 200), "short");
    }

    #[test]
    fn test_clamp_importance() {
        assert_eq!(clamp_importance(0), 1);
        assert_eq!(clamp_importance(-3), 1);
        assert_eq!(clamp_importance(7), 7);
        assert_eq!(clamp_importance(42), 10);
    }
}
