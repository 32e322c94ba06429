//! Bearer tokens mapped to users.

use rusqlite::params;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::User;

use super::{Store, ts};

const TOKEN_PREFIX: &str = "dhv_";

impl Store {
    /// Issue a fresh random token for `user_id`.
    pub fn issue_token(&self, user_id: Uuid) -> Result<String> {
        if self.get_user(user_id)?.is_none() {
            return Err(StoreError::NotFound(format!("User {user_id} not found")));
        }

        let token = format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple());
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id.to_string(), ts(&super::now())],
        )?;

        debug!(user_id = %user_id, "Issued token");
        Ok(token)
    }

    /// The user a token belongs to.
    pub fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT u.id, u.email, u.kind, u.first_name, u.last_name, u.date_of_birth,
                   u.weight, u.height, u.mobile_number, u.dietary_preference,
                   u.medical_conditions, u.food_liking, u.food_disliking,
                   u.fitness_goal, u.activity_level, u.gender, u.prompt, u.created_at
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = ?1
            "#,
        )?;
        let mut rows = stmt.query(params![token])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    /// Returns whether a token was removed.
    pub fn revoke_token(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected =
            conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::store_with_user;
    use super::*;

    #[test]
    fn test_issue_and_resolve() {
        let (store, id) = store_with_user();
        let token = store.issue_token(id).unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));

        let user = store.user_for_token(&token).unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(store.user_for_token("dhv_unknown").unwrap().is_none());
    }

    #[test]
    fn test_tokens_are_distinct() {
        let (store, id) = store_with_user();
        assert_ne!(store.issue_token(id).unwrap(), store.issue_token(id).unwrap());
    }

    #[test]
    fn test_issue_for_unknown_user() {
        let (store, _) = store_with_user();
        assert!(store.issue_token(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_revoke() {
        let (store, id) = store_with_user();
        let token = store.issue_token(id).unwrap();
        assert!(store.revoke_token(&token).unwrap());
        assert!(!store.revoke_token(&token).unwrap());
        assert!(store.user_for_token(&token).unwrap().is_none());
    }
}
