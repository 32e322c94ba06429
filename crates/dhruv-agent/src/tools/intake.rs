//! Water and calorie logging tools.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dhruv_store::{IntakeBackend, NewCalorieIntake, NewWaterIntake, ValidationError};
use dhruv_types::{CalorieSource, MealType, WaterSource, WaterUnit};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::tool::{ParamExt, ParameterValidationError, Tool, ToolContext, ToolResult};

// ─────────────────────────────────────────────────────────────────────────────
// Parameters
// ─────────────────────────────────────────────────────────────────────────────

/// Validated arguments for `log_water_intake`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterIntakeParams {
    pub amount: f64,
    pub unit: WaterUnit,
    pub consumed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: WaterSource,
}

impl TryFrom<Value> for WaterIntakeParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        let amount = params.positive_f64("amount", "Amount")?;
        let unit = params
            .optional_parsed("unit", ValidationError::InvalidWaterUnit)?
            .unwrap_or_default();
        let consumed_at = params.optional_timestamp("consumedAt")?;
        let source = params
            .optional_parsed("source", ValidationError::InvalidWaterSource)?
            .unwrap_or_default();

        Ok(Self {
            amount,
            unit,
            consumed_at,
            notes: params.optional_str("notes").map(String::from),
            source,
        })
    }
}

impl From<WaterIntakeParams> for NewWaterIntake {
    fn from(params: WaterIntakeParams) -> Self {
        NewWaterIntake {
            amount: params.amount,
            unit: params.unit,
            consumed_at: params.consumed_at,
            notes: params.notes,
            source: params.source,
        }
    }
}

/// Validated arguments for `log_calories_intake`.
///
/// Fields are checked in the order the errors are reported: calories, food
/// item, quantity, unit, then the three macros.
#[derive(Debug, Clone, PartialEq)]
pub struct CalorieIntakeParams {
    pub calories: f64,
    pub food_item: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub carbs: f64,
    pub proteins: f64,
    pub fats: f64,
    pub meal_type: MealType,
    pub consumed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: CalorieSource,
}

impl TryFrom<Value> for CalorieIntakeParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        let calories = params.positive_f64("calories", "Calories")?;

        let food_item = params.optional_str("foodItem").unwrap_or("").trim();
        if food_item.is_empty() {
            return Err(ValidationError::MissingFoodItem.into());
        }
        if food_item.chars().count() > dhruv_store::validation::FOOD_ITEM_MAX_CHARS {
            return Err(ValidationError::FoodItemTooLong.into());
        }

        let quantity = params.optional_positive_f64("quantity", "Quantity")?;
        let unit = params.optional_str("unit").map(str::trim).map(String::from);
        if let Some(unit) = &unit
            && unit.chars().count() > dhruv_store::validation::UNIT_MAX_CHARS
        {
            return Err(ValidationError::UnitTooLong.into());
        }

        let carbs = params.positive_f64("carbs", "Carbs")?;
        let proteins = params.positive_f64("proteins", "Proteins")?;
        let fats = params.positive_f64("fats", "Fats")?;

        let meal_type = params
            .optional_parsed("mealType", ValidationError::InvalidMealType)?
            .unwrap_or_default();
        let consumed_at = params.optional_timestamp("consumedAt")?;
        let source = params
            .optional_parsed("source", ValidationError::InvalidCalorieSource)?
            .unwrap_or_default();

        Ok(Self {
            calories,
            food_item: food_item.to_string(),
            quantity,
            unit,
            carbs,
            proteins,
            fats,
            meal_type,
            consumed_at,
            notes: params.optional_str("notes").map(String::from),
            source,
        })
    }
}

impl From<CalorieIntakeParams> for NewCalorieIntake {
    fn from(params: CalorieIntakeParams) -> Self {
        NewCalorieIntake {
            calories: params.calories,
            food_item: params.food_item,
            quantity: params.quantity,
            unit: params.unit,
            meal_type: params.meal_type,
            carbs: params.carbs,
            proteins: params.proteins,
            fats: params.fats,
            consumed_at: params.consumed_at,
            notes: params.notes,
            source: params.source,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Water
// ─────────────────────────────────────────────────────────────────────────────

/// Records a water intake for the turn's user.
pub struct LogWaterIntakeTool {
    backend: Arc<dyn IntakeBackend>,
}

impl LogWaterIntakeTool {
    pub const NAME: &'static str = "log_water_intake";

    pub fn new(backend: Arc<dyn IntakeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for LogWaterIntakeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Log and save the water intake by User"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "exclusiveMinimum": 0,
                    "description": "Amount of water consumed"
                },
                "unit": {
                    "type": "string",
                    "enum": ["ml", "oz"],
                    "default": "ml"
                },
                "consumedAt": {
                    "type": "string",
                    "format": "date-time",
                    "description": "When the water was consumed; defaults to now"
                },
                "notes": { "type": "string" },
                "source": {
                    "type": "string",
                    "enum": ["manual", "app", "device"],
                    "default": "app"
                }
            },
            "required": ["amount"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params = match WaterIntakeParams::try_from(params) {
            Ok(p) => p,
            Err(e) => {
                warn!(user_id = %ctx.user_id, tool = Self::NAME, error = %e, "Rejected water intake");
                return Ok(e.into());
            }
        };

        let (amount, unit) = (params.amount, params.unit);
        match self.backend.add_water_intake(ctx.user_id, params.into()) {
            Ok(entry) => {
                info!(user_id = %ctx.user_id, tool = Self::NAME, amount, unit = %unit, "Logged water intake");
                Ok(ToolResult::ok(
                    format!("Successfully logged {amount}{unit} of water intake"),
                    serde_json::to_value(&entry)?,
                ))
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, tool = Self::NAME, error = %e, "Failed to log water intake");
                Ok(ToolResult::failure(e.to_string()))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calories
// ─────────────────────────────────────────────────────────────────────────────

/// Records a food entry with its calories and macros.
pub struct LogCaloriesIntakeTool {
    backend: Arc<dyn IntakeBackend>,
}

impl LogCaloriesIntakeTool {
    pub const NAME: &'static str = "log_calories_intake";

    pub fn new(backend: Arc<dyn IntakeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for LogCaloriesIntakeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Log and save the calories and other macros like carbs, proteins and fats intake by User"
    }

    fn parameters(&self) -> Value {
        let positive = |description: &str| {
            json!({ "type": "number", "exclusiveMinimum": 0, "description": description })
        };
        json!({
            "type": "object",
            "properties": {
                "calories": positive("Calories in kcal"),
                "carbs": positive("Carbohydrates in grams"),
                "proteins": positive("Protein in grams"),
                "fats": positive("Fat in grams"),
                "foodItem": {
                    "type": "string",
                    "minLength": 1,
                    "maxLength": dhruv_store::validation::FOOD_ITEM_MAX_CHARS
                },
                "quantity": positive("How much was eaten, in `unit`"),
                "unit": {
                    "type": "string",
                    "maxLength": dhruv_store::validation::UNIT_MAX_CHARS
                },
                "mealType": {
                    "type": "string",
                    "enum": MealType::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
                    "default": "snack"
                },
                "consumedAt": { "type": "string", "format": "date-time" },
                "notes": { "type": "string" },
                "source": {
                    "type": "string",
                    "enum": ["manual", "app", "barcode"],
                    "default": "app"
                }
            },
            "required": ["calories", "carbs", "proteins", "fats", "foodItem"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params = match CalorieIntakeParams::try_from(params) {
            Ok(p) => p,
            Err(e) => {
                warn!(user_id = %ctx.user_id, tool = Self::NAME, error = %e, "Rejected calorie intake");
                return Ok(e.into());
            }
        };

        let calories = params.calories;
        let food_item = params.food_item.clone();
        match self.backend.add_calorie_intake(ctx.user_id, params.into()) {
            Ok(entry) => {
                info!(
                    user_id = %ctx.user_id,
                    tool = Self::NAME,
                    calories,
                    meal_type = %entry.meal_type,
                    "Logged calorie intake"
                );
                Ok(ToolResult::ok(
                    format!("Successfully logged {calories} calories for {food_item}"),
                    serde_json::to_value(&entry)?,
                ))
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, tool = Self::NAME, error = %e, "Failed to log calorie intake");
                Ok(ToolResult::failure(e.to_string()))
            }
        }
    }
}
