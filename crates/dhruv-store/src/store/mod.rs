//! SQLite-backed store.
//!
//! Timestamps are written as RFC 3339 UTC with millisecond precision so that
//! range filters can compare the text columns directly.

mod chat_ops;
mod intake_ops;
mod memory_ops;
mod token_ops;
mod user_ops;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::{Result, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Schema Version
// ─────────────────────────────────────────────────────────────────────────────

const SCHEMA_VERSION: i32 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// The application database.
pub struct Store {
    pub(crate) conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|_| {
                StoreError::Database(rusqlite::Error::InvalidPath(path.to_path_buf()))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;

        info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// An in-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize()?;
        debug!("In-memory store created");
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::create_schema(&conn)
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if current_version > SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        if current_version == SCHEMA_VERSION {
            debug!(version = current_version, "Schema up to date");
            return Ok(());
        }

        info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrating schema"
        );

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL DEFAULT 'regular',
                first_name TEXT,
                last_name TEXT,
                date_of_birth TEXT,
                weight TEXT,
                height TEXT,
                mobile_number TEXT,
                dietary_preference TEXT,
                medical_conditions TEXT NOT NULL DEFAULT '[]',
                food_liking TEXT NOT NULL DEFAULT '[]',
                food_disliking TEXT NOT NULL DEFAULT '[]',
                fitness_goal TEXT,
                activity_level TEXT,
                gender TEXT,
                prompt TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auth_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                visibility TEXT NOT NULL DEFAULT 'private',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chats_user
                ON chats(user_id, created_at);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL REFERENCES chats(id),
                role TEXT NOT NULL,
                parts TEXT NOT NULL,
                attachments TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat
                ON messages(chat_id, created_at);

            CREATE TABLE IF NOT EXISTS streams (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL REFERENCES chats(id),
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_streams_chat
                ON streams(chat_id, created_at);
            "#,
        )?;

        if current_version < 2 {
            Self::migrate_v2(conn)?;
        }

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        info!(version = SCHEMA_VERSION, "Schema ready");
        Ok(())
    }

    /// Migration v2: intake logs and user memories.
    fn migrate_v2(conn: &Connection) -> Result<()> {
        info!("Running migration v2: intake logs and user memories");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS water_intake_log (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                amount REAL NOT NULL CHECK (amount > 0),
                unit TEXT NOT NULL DEFAULT 'ml',
                consumed_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                notes TEXT,
                source TEXT NOT NULL DEFAULT 'app'
            );

            CREATE INDEX IF NOT EXISTS idx_water_user_consumed
                ON water_intake_log(user_id, consumed_at);

            CREATE TABLE IF NOT EXISTS calories_intake_log (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                calories REAL NOT NULL CHECK (calories > 0),
                food_item TEXT NOT NULL,
                quantity REAL,
                unit TEXT,
                meal_type TEXT NOT NULL DEFAULT 'snack',
                carbs REAL NOT NULL,
                proteins REAL NOT NULL,
                fats REAL NOT NULL,
                consumed_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                notes TEXT,
                source TEXT NOT NULL DEFAULT 'app'
            );

            CREATE INDEX IF NOT EXISTS idx_calories_user_consumed
                ON calories_intake_log(user_id, consumed_at);

            CREATE TABLE IF NOT EXISTS user_memories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                memory_content TEXT NOT NULL,
                memory_type TEXT NOT NULL DEFAULT 'general',
                importance_score INTEGER NOT NULL DEFAULT 5
                    CHECK (importance_score BETWEEN 1 AND 10),
                tags TEXT,
                source TEXT NOT NULL DEFAULT 'conversation',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_memories_user_active
                ON user_memories(user_id, is_active, importance_score DESC, updated_at DESC);
            "#,
        )?;
        info!("Migration v2 complete");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

impl Store {
    /// Run `f` inside a transaction; an `Err` rolls everything back.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Current time at the precision the columns keep.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub(crate) fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp '{value}': {e}")))
}

pub(crate) fn parse_id(value: &str) -> Result<uuid::Uuid> {
    Ok(uuid::Uuid::parse_str(value)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use dhruv_types::UserKind;
    use uuid::Uuid;

    pub fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    pub fn store_with_user() -> (Store, Uuid) {
        let store = store();
        let user = store.create_user("asha@example.com", UserKind::Regular).unwrap();
        (store, user.id)
    }

    pub fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhruv_types::UserKind;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory_sets_version() {
        let store = test_support::store();
        let conn = store.conn.lock();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_open_creates_parent_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dhruv.db");

        let id = {
            let store = Store::open(&path).unwrap();
            store.create_user("ravi@example.com", UserKind::Guest).unwrap().id
        };

        let store = Store::open(&path).unwrap();
        let user = store.get_user(id).unwrap().unwrap();
        assert_eq!(user.kind, UserKind::Guest);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dhruv.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }
        let err = Store::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = test_support::store();
        let result: Result<()> = store.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, created_at) VALUES ('u1', 'a@b.c', '2026-01-01T00:00:00.000Z')",
                [],
            )?;
            Err(StoreError::Validation("abort".into()))
        });
        assert!(result.is_err());
        assert!(store.get_user_by_email("a@b.c").unwrap().is_none());
    }

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let a = ts(&test_support::utc("2026-03-09T18:30:00Z"));
        let b = ts(&test_support::utc("2026-03-09T18:30:00.5Z"));
        assert_eq!(a, "2026-03-09T18:30:00.000Z");
        assert!(a < b);
        assert_eq!(parse_ts(&b).unwrap(), test_support::utc("2026-03-09T18:30:00.5Z"));
    }
}
