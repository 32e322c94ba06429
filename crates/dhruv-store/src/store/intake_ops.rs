//! Water and calorie intake logs and the daily IST summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use dhruv_types::intake::ML_PER_OZ;
use dhruv_types::{MealType, WaterUnit};

use crate::error::Result;
use crate::ist::{IST_LABEL, IstDay, round2};
use crate::types::{
    CalorieIntake, DailyIntakeSummary, MealCalories, NewCalorieIntake, NewWaterIntake, WaterByUnit,
    WaterIntake,
};
use crate::validation::{validate_calorie_batch, validate_calorie_intake, validate_water_intake};

use super::{Store, parse_id, parse_ts, ts};

impl Store {
    // ─────────────────────────────────────────────────────────────────────
    // Water
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_water_intake(&self, user_id: Uuid, entry: NewWaterIntake) -> Result<WaterIntake> {
        validate_water_intake(&entry)?;

        let now = super::now();
        let row = WaterIntake {
            id: Uuid::new_v4(),
            user_id,
            amount: entry.amount,
            unit: entry.unit,
            consumed_at: entry.consumed_at.unwrap_or(now),
            created_at: now,
            notes: entry.notes,
            source: entry.source,
        };

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO water_intake_log
                (id, user_id, amount, unit, consumed_at, created_at, notes, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                row.id.to_string(),
                user_id.to_string(),
                row.amount,
                row.unit.as_str(),
                ts(&row.consumed_at),
                ts(&row.created_at),
                row.notes,
                row.source.as_str(),
            ],
        )?;

        debug!(user_id = %user_id, amount = row.amount, unit = %row.unit, "Logged water intake");
        Ok(row)
    }

    /// Water logs with `start <= consumed_at < end`, oldest first.
    pub fn water_intakes_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WaterIntake>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, amount, unit, consumed_at, created_at, notes, source
            FROM water_intake_log
            WHERE user_id = ?1 AND consumed_at >= ?2 AND consumed_at < ?3
            ORDER BY consumed_at ASC
            "#,
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), ts(&start), ts(&end)])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(Self::row_to_water(row)?);
        }
        Ok(entries)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calories
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_calorie_intake(
        &self,
        user_id: Uuid,
        entry: NewCalorieIntake,
    ) -> Result<CalorieIntake> {
        validate_calorie_intake(&entry)?;
        let conn = self.conn.lock();
        let row = Self::insert_calorie(&conn, user_id, entry, super::now())?;
        debug!(user_id = %user_id, calories = row.calories, food_item = %row.food_item, "Logged calorie intake");
        Ok(row)
    }

    /// Validate every entry, then insert all of them in one transaction.
    pub fn add_calorie_intakes(
        &self,
        user_id: Uuid,
        entries: Vec<NewCalorieIntake>,
    ) -> Result<Vec<CalorieIntake>> {
        validate_calorie_batch(&entries)?;

        let now = super::now();
        let rows = self.with_transaction(|conn| {
            entries
                .into_iter()
                .map(|entry| Self::insert_calorie(conn, user_id, entry, now))
                .collect::<Result<Vec<_>>>()
        })?;

        debug!(user_id = %user_id, count = rows.len(), "Logged calorie intakes");
        Ok(rows)
    }

    fn insert_calorie(
        conn: &Connection,
        user_id: Uuid,
        entry: NewCalorieIntake,
        now: DateTime<Utc>,
    ) -> Result<CalorieIntake> {
        let row = CalorieIntake {
            id: Uuid::new_v4(),
            user_id,
            calories: entry.calories,
            food_item: entry.food_item.trim().to_string(),
            quantity: entry.quantity,
            unit: entry.unit,
            meal_type: entry.meal_type,
            carbs: entry.carbs,
            proteins: entry.proteins,
            fats: entry.fats,
            consumed_at: entry.consumed_at.unwrap_or(now),
            created_at: now,
            notes: entry.notes,
            source: entry.source,
        };

        conn.execute(
            r#"
            INSERT INTO calories_intake_log
                (id, user_id, calories, food_item, quantity, unit, meal_type,
                 carbs, proteins, fats, consumed_at, created_at, notes, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                row.id.to_string(),
                user_id.to_string(),
                row.calories,
                row.food_item,
                row.quantity,
                row.unit,
                row.meal_type.as_str(),
                row.carbs,
                row.proteins,
                row.fats,
                ts(&row.consumed_at),
                ts(&row.created_at),
                row.notes,
                row.source.as_str(),
            ],
        )?;
        Ok(row)
    }

    /// Calorie logs with `start <= consumed_at < end`, oldest first.
    pub fn calorie_intakes_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalorieIntake>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, calories, food_item, quantity, unit, meal_type,
                   carbs, proteins, fats, consumed_at, created_at, notes, source
            FROM calories_intake_log
            WHERE user_id = ?1 AND consumed_at >= ?2 AND consumed_at < ?3
            ORDER BY consumed_at ASC
            "#,
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), ts(&start), ts(&end)])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(Self::row_to_calorie(row)?);
        }
        Ok(entries)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Aggregation
    // ─────────────────────────────────────────────────────────────────────

    /// Calories logged on the IST day containing `at`, rounded to 2 dp.
    pub fn daily_calories_total(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<f64> {
        let day = IstDay::containing(at);
        let conn = self.conn.lock();
        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(calories), 0)
            FROM calories_intake_log
            WHERE user_id = ?1 AND consumed_at >= ?2 AND consumed_at < ?3
            "#,
            params![user_id.to_string(), ts(&day.start), ts(&day.end)],
            |row| row.get(0),
        )?;
        Ok(round2(total))
    }

    /// Totals for the IST day containing `at`, summed from the rows.
    pub fn daily_summary(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<DailyIntakeSummary> {
        let day = IstDay::containing(at);
        let water = self.water_intakes_between(user_id, day.start, day.end)?;
        let calories = self.calorie_intakes_between(user_id, day.start, day.end)?;

        let mut by_unit = WaterByUnit::default();
        let mut total_ml = 0.0;
        for entry in &water {
            total_ml += entry.unit.to_ml(entry.amount);
            match entry.unit {
                WaterUnit::Ml => by_unit.ml += entry.amount,
                WaterUnit::Oz => by_unit.oz += entry.amount,
            }
        }

        let mut by_meal: BTreeMap<String, MealCalories> = MealType::ALL
            .iter()
            .map(|meal| (meal.as_str().to_string(), MealCalories::default()))
            .collect();
        let (mut kcal, mut carbs, mut proteins, mut fats) = (0.0, 0.0, 0.0, 0.0);
        for entry in &calories {
            kcal += entry.calories;
            carbs += entry.carbs;
            proteins += entry.proteins;
            fats += entry.fats;
            let meal = by_meal
                .entry(entry.meal_type.as_str().to_string())
                .or_default();
            meal.calories += entry.calories;
            meal.entries += 1;
        }
        for meal in by_meal.values_mut() {
            meal.calories = round2(meal.calories);
        }

        Ok(DailyIntakeSummary {
            calorie_amount: round2(kcal),
            water_intake_amount: round2(total_ml),
            water_intake_amount_oz: round2(total_ml / ML_PER_OZ),
            carbs_amount: round2(carbs),
            proteins_amount: round2(proteins),
            fats_amount: round2(fats),
            date: day.date_string(),
            timezone: IST_LABEL.to_string(),
            calorie_entry_count: calories.len(),
            water_entry_count: water.len(),
            calories_by_meal: by_meal,
            water_by_unit: WaterByUnit {
                ml: round2(by_unit.ml),
                oz: round2(by_unit.oz),
            },
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Row Mapping
    // ─────────────────────────────────────────────────────────────────────

    fn row_to_water(row: &rusqlite::Row) -> Result<WaterIntake> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let unit: String = row.get(3)?;
        let consumed_at: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let source: String = row.get(7)?;

        Ok(WaterIntake {
            id: parse_id(&id)?,
            user_id: parse_id(&user_id)?,
            amount: row.get(2)?,
            unit: unit.parse()?,
            consumed_at: parse_ts(&consumed_at)?,
            created_at: parse_ts(&created_at)?,
            notes: row.get(6)?,
            source: source.parse()?,
        })
    }

    fn row_to_calorie(row: &rusqlite::Row) -> Result<CalorieIntake> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let meal_type: String = row.get(6)?;
        let consumed_at: String = row.get(10)?;
        let created_at: String = row.get(11)?;
        let source: String = row.get(13)?;

        Ok(CalorieIntake {
            id: parse_id(&id)?,
            user_id: parse_id(&user_id)?,
            calories: row.get(2)?,
            food_item: row.get(3)?,
            quantity: row.get(4)?,
            unit: row.get(5)?,
            meal_type: meal_type.parse()?,
            carbs: row.get(7)?,
            proteins: row.get(8)?,
            fats: row.get(9)?,
            consumed_at: parse_ts(&consumed_at)?,
            created_at: parse_ts(&created_at)?,
            notes: row.get(12)?,
            source: source.parse()?,
        })
    }
}
