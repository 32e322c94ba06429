//! User accounts, onboarding profiles and custom prompts.

use rusqlite::{OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use dhruv_types::UserKind;

use crate::error::{Result, StoreError};
use crate::types::{ProfileUpdate, User, UserProfile};
use crate::validation::validate_email;

use super::{Store, parse_id, parse_ts, ts};

const USER_COLUMNS: &str = r#"
    id, email, kind, first_name, last_name, date_of_birth, weight, height,
    mobile_number, dietary_preference, medical_conditions, food_liking,
    food_disliking, fitness_goal, activity_level, gender, prompt, created_at
"#;

impl Store {
    /// Create an account. Emails are unique.
    pub fn create_user(&self, email: &str, kind: UserKind) -> Result<User> {
        validate_email(email)?;
        let email = email.trim();

        if self.get_user_by_email(email)?.is_some() {
            return Err(StoreError::Validation(format!(
                "A user with email {email} already exists"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            kind,
            profile: UserProfile::default(),
            prompt: None,
            created_at: super::now(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.to_string(),
                user.email,
                user.kind.as_str(),
                ts(&user.created_at)
            ],
        )?;

        debug!(user_id = %user.id, kind = %kind, "Created user");
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.to_string()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![email.trim()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    /// Apply a partial profile edit to the account with `email`. Keys the
    /// form did not send keep their stored value. Returns `false` when no
    /// account has that email.
    pub fn update_user_profile(&self, email: &str, update: ProfileUpdate) -> Result<bool> {
        let Some(user) = self.get_user_by_email(email)? else {
            return Ok(false);
        };
        let mut profile = user.profile;
        update.apply_to(&mut profile);

        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            r#"
            UPDATE users SET
                first_name = ?2, last_name = ?3, date_of_birth = ?4, weight = ?5,
                height = ?6, mobile_number = ?7, dietary_preference = ?8,
                medical_conditions = ?9, food_liking = ?10, food_disliking = ?11,
                fitness_goal = ?12, activity_level = ?13, gender = ?14
            WHERE id = ?1
            "#,
            params![
                user.id.to_string(),
                profile.first_name,
                profile.last_name,
                profile.date_of_birth,
                profile.weight,
                profile.height,
                profile.mobile_number,
                profile.dietary_preference,
                serde_json::to_string(&profile.medical_conditions)?,
                serde_json::to_string(&profile.food_liking)?,
                serde_json::to_string(&profile.food_disliking)?,
                profile.fitness_goal,
                profile.activity_level,
                profile.gender,
            ],
        )?;

        debug!(email, "Updated user profile");
        Ok(rows_affected > 0)
    }

    /// The profile of `user_id`, or `None` for an unknown user. Empty fields
    /// are returned as-is.
    pub fn user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.get_user(user_id)?.map(|u| u.profile))
    }

    pub fn user_prompt(&self, email: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let prompt: Option<Option<String>> = conn
            .query_row(
                "SELECT prompt FROM users WHERE email = ?1",
                params![email.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(prompt.flatten())
    }

    /// Set or clear the custom prompt of the account with `email`.
    pub fn set_user_prompt(&self, email: &str, prompt: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());
        let rows_affected = conn.execute(
            "UPDATE users SET prompt = ?2 WHERE email = ?1",
            params![email.trim(), prompt],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(format!("User {email} not found")));
        }
        Ok(())
    }

    pub(crate) fn row_to_user(row: &rusqlite::Row) -> Result<User> {
        let id: String = row.get(0)?;
        let kind: String = row.get(2)?;
        let medical_conditions: String = row.get(10)?;
        let food_liking: String = row.get(11)?;
        let food_disliking: String = row.get(12)?;
        let created_at: String = row.get(17)?;

        Ok(User {
            id: parse_id(&id)?,
            email: row.get(1)?,
            kind: kind.parse()?,
            profile: UserProfile {
                first_name: row.get(3)?,
                last_name: row.get(4)?,
                date_of_birth: row.get(5)?,
                weight: row.get(6)?,
                height: row.get(7)?,
                mobile_number: row.get(8)?,
                dietary_preference: row.get(9)?,
                medical_conditions: serde_json::from_str(&medical_conditions)?,
                food_liking: serde_json::from_str(&food_liking)?,
                food_disliking: serde_json::from_str(&food_disliking)?,
                fitness_goal: row.get(13)?,
                activity_level: row.get(14)?,
                gender: row.get(15)?,
            },
            prompt: row.get(16)?,
            created_at: parse_ts(&created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store, store_with_user};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_and_get_user() {
        let store = store();
        let user = store.create_user("  meera@example.com ", UserKind::Guest).unwrap();
        assert_eq!(user.email, "meera@example.com");

        let fetched = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(fetched.email, user.email);
        assert_eq!(fetched.kind, UserKind::Guest);
        assert_eq!(fetched.profile, UserProfile::default());

        let by_email = store.get_user_by_email("meera@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (store, _) = store_with_user();
        let err = store
            .create_user("asha@example.com", UserKind::Regular)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_email_required() {
        let store = store();
        let err = store.create_user("   ", UserKind::Regular).unwrap_err();
        assert_eq!(err.to_string(), "Email is required");
    }

    fn update(value: serde_json::Value) -> ProfileUpdate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_update_profile_by_email() {
        let (store, id) = store_with_user();
        let applied = store
            .update_user_profile(
                "asha@example.com",
                update(json!({
                    "firstName": "Asha",
                    "dateOfBirth": "1994-02-11",
                    "weight": "68",
                    "medicalConditions": ["PCOS"],
                    "foodLiking": ["poha", "paneer"],
                })),
            )
            .unwrap();
        assert!(applied);

        let stored = store.user_profile(id).unwrap().unwrap();
        assert_eq!(
            stored,
            UserProfile {
                first_name: Some("Asha".into()),
                date_of_birth: Some("1994-02-11".into()),
                weight: Some("68".into()),
                medical_conditions: vec!["PCOS".into()],
                food_liking: vec!["poha".into(), "paneer".into()],
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_partial_update_keeps_unsent_fields() {
        let (store, id) = store_with_user();
        store
            .update_user_profile(
                "asha@example.com",
                update(json!({ "firstName": "Asha", "foodLiking": ["dosa"] })),
            )
            .unwrap();
        store
            .update_user_profile("asha@example.com", update(json!({ "weight": "62" })))
            .unwrap();

        let stored = store.user_profile(id).unwrap().unwrap();
        assert_eq!(stored.first_name.as_deref(), Some("Asha"));
        assert_eq!(stored.food_liking, vec!["dosa".to_string()]);
        assert_eq!(stored.weight.as_deref(), Some("62"));

        store
            .update_user_profile("asha@example.com", update(json!({ "firstName": null })))
            .unwrap();
        let stored = store.user_profile(id).unwrap().unwrap();
        assert_eq!(stored.first_name, None);
        assert_eq!(stored.weight.as_deref(), Some("62"));
    }

    #[test]
    fn test_update_profile_unknown_email() {
        let store = store();
        let applied = store
            .update_user_profile("ghost@example.com", update(json!({ "weight": "70" })))
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_profile_of_unknown_user_is_none() {
        let store = store();
        assert!(store.user_profile(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_prompt_get_set_clear() {
        let (store, _) = store_with_user();
        assert_eq!(store.user_prompt("asha@example.com").unwrap(), None);

        store
            .set_user_prompt("asha@example.com", Some("Reply in Hinglish."))
            .unwrap();
        assert_eq!(
            store.user_prompt("asha@example.com").unwrap().as_deref(),
            Some("Reply in Hinglish.")
        );

        store.set_user_prompt("asha@example.com", Some("  ")).unwrap();
        assert_eq!(store.user_prompt("asha@example.com").unwrap(), None);

        assert_eq!(store.user_prompt("ghost@example.com").unwrap(), None);
        assert!(store.set_user_prompt("ghost@example.com", None).is_err());
    }
}
