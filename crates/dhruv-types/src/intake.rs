//! Water and calorie intake enums.

use crate::string_enum;

/// Millilitres in one US fluid ounce.
pub const ML_PER_OZ: f64 = 29.5735;

string_enum! {
    /// Volume unit for a water log.
    WaterUnit, "unit", default = Ml {
        Ml => "ml",
        Oz => "oz",
    }
}

impl WaterUnit {
    /// Convert an amount in this unit to millilitres.
    pub fn to_ml(&self, amount: f64) -> f64 {
        match self {
            WaterUnit::Ml => amount,
            WaterUnit::Oz => amount * ML_PER_OZ,
        }
    }
}

string_enum! {
    /// How a water log was recorded.
    WaterSource, "water source", default = App {
        Manual => "manual",
        App => "app",
        Device => "device",
    }
}

string_enum! {
    /// How a calorie log was recorded.
    CalorieSource, "calorie source", default = App {
        Manual => "manual",
        App => "app",
        Barcode => "barcode",
    }
}

string_enum! {
    /// Meal a calorie log belongs to.
    MealType, "meal type", default = Snack {
        Breakfast => "breakfast",
        Lunch => "lunch",
        Dinner => "dinner",
        Snack => "snack",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oz_converts_to_ml() {
        assert!((WaterUnit::Oz.to_ml(1.0) - 29.5735).abs() < f64::EPSILON);
        assert_eq!(WaterUnit::Ml.to_ml(250.0), 250.0);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(WaterUnit::default(), WaterUnit::Ml);
        assert_eq!(WaterSource::default(), WaterSource::App);
        assert_eq!(CalorieSource::default(), CalorieSource::App);
        assert_eq!(MealType::default(), MealType::Snack);
    }

    #[test]
    fn test_meal_type_parse() {
        assert_eq!("dinner".parse::<MealType>().unwrap(), MealType::Dinner);
        assert!("brunch".parse::<MealType>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&CalorieSource::Barcode).unwrap();
        assert_eq!(json, "\"barcode\"");
    }
}
