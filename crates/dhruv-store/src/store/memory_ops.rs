//! User memory CRUD.
//!
//! Memories are never hard-deleted; forgetting one clears `is_active`.

use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use dhruv_types::config_defaults::MEMORY_CONTENT_MAX_CHARS;

use crate::error::{Result, StoreError};
use crate::types::{MemoryFilter, MemoryRecord, MemoryUpdate, NewMemory};
use crate::validation::{
    ValidationError, clamp_importance, truncate_chars, validate_memory, validate_memory_batch,
};

use super::{Store, parse_id, parse_ts, ts};

const MEMORY_COLUMNS: &str = r#"
    id, user_id, memory_content, memory_type, importance_score, tags, source,
    is_active, created_at, updated_at
"#;

const UPDATE_FAILED: &str = "Memory not found or update failed";

impl Store {
    /// Insert one memory for `user_id`.
    ///
    /// Content is trimmed and cut to 200 characters, the score clamped into
    /// 1..=10, and an empty tag list stored as no tags.
    pub fn add_memory(&self, user_id: Uuid, memory: NewMemory) -> Result<MemoryRecord> {
        validate_memory(&memory)?;
        let conn = self.conn.lock();
        let record = Self::insert_memory(&conn, user_id, memory)?;
        debug!(
            user_id = %user_id,
            memory_id = %record.id,
            memory_type = %record.memory_type,
            importance = record.importance_score,
            "Stored memory"
        );
        Ok(record)
    }

    /// Validate every memory, then insert all of them in one transaction.
    pub fn add_memories(&self, user_id: Uuid, memories: Vec<NewMemory>) -> Result<Vec<MemoryRecord>> {
        validate_memory_batch(&memories)?;
        let records = self.with_transaction(|conn| {
            memories
                .into_iter()
                .map(|memory| Self::insert_memory(conn, user_id, memory))
                .collect::<Result<Vec<_>>>()
        })?;
        debug!(user_id = %user_id, count = records.len(), "Stored memories");
        Ok(records)
    }

    fn insert_memory(conn: &Connection, user_id: Uuid, memory: NewMemory) -> Result<MemoryRecord> {
        let now = super::now();
        let tags = (!memory.tags.is_empty()).then_some(memory.tags);
        let record = MemoryRecord {
            id: Uuid::new_v4(),
            user_id,
            memory_content: truncate_chars(&memory.memory_content, MEMORY_CONTENT_MAX_CHARS),
            memory_type: memory.memory_type,
            importance_score: clamp_importance(memory.importance_score),
            tags,
            source: memory.source,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            r#"
            INSERT INTO user_memories
                (id, user_id, memory_content, memory_type, importance_score, tags,
                 source, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
            "#,
            params![
                record.id.to_string(),
                user_id.to_string(),
                record.memory_content,
                record.memory_type.as_str(),
                record.importance_score,
                record.tags.as_ref().map(serde_json::to_string).transpose()?,
                record.source.as_str(),
                ts(&record.created_at),
                ts(&record.updated_at),
            ],
        )?;
        Ok(record)
    }

    pub fn get_memory(&self, id: Uuid) -> Result<Option<MemoryRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM user_memories WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.to_string()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_memory(row)?)),
            None => Ok(None),
        }
    }

    /// Active memories matching `filter`, by importance then recency.
    pub fn list_memories(&self, user_id: Uuid, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM user_memories
            WHERE user_id = ?1
              AND is_active = 1
              AND importance_score >= ?2
              AND (?3 IS NULL OR memory_type = ?3)
            ORDER BY importance_score DESC, updated_at DESC
            LIMIT ?4
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            user_id.to_string(),
            filter.min_importance,
            filter.memory_type.map(|t| t.as_str()),
            filter.limit as i64,
        ])?;

        let mut memories = Vec::new();
        while let Some(row) = rows.next()? {
            memories.push(Self::row_to_memory(row)?);
        }
        Ok(memories)
    }

    /// All active memories up to `limit`, any type.
    pub fn active_memories(&self, user_id: Uuid, limit: usize) -> Result<Vec<MemoryRecord>> {
        self.list_memories(
            user_id,
            &MemoryFilter {
                limit,
                ..Default::default()
            },
        )
    }

    /// Apply `update` and bump `updated_at`.
    pub fn update_memory(&self, id: Uuid, update: MemoryUpdate) -> Result<MemoryRecord> {
        let Some(mut record) = self.get_memory(id)? else {
            return Err(StoreError::NotFound(UPDATE_FAILED.to_string()));
        };

        if let Some(content) = update.memory_content {
            if content.trim().is_empty() {
                return Err(ValidationError::MissingMemoryContent.into());
            }
            record.memory_content = truncate_chars(&content, MEMORY_CONTENT_MAX_CHARS);
        }
        if let Some(memory_type) = update.memory_type {
            record.memory_type = memory_type;
        }
        if let Some(score) = update.importance_score {
            record.importance_score = clamp_importance(score);
        }
        if let Some(tags) = update.tags {
            record.tags = (!tags.is_empty()).then_some(tags);
        }
        if let Some(active) = update.is_active {
            record.is_active = active;
        }
        record.updated_at = super::now();

        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            r#"
            UPDATE user_memories SET
                memory_content = ?2, memory_type = ?3, importance_score = ?4,
                tags = ?5, is_active = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                id.to_string(),
                record.memory_content,
                record.memory_type.as_str(),
                record.importance_score,
                record.tags.as_ref().map(serde_json::to_string).transpose()?,
                record.is_active,
                ts(&record.updated_at),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(UPDATE_FAILED.to_string()));
        }
        debug!(memory_id = %id, "Updated memory");
        Ok(record)
    }

    /// Soft-delete. Returns whether an active memory was deactivated.
    pub fn forget_memory(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "UPDATE user_memories SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
            params![id.to_string(), ts(&super::now())],
        )?;
        if rows_affected > 0 {
            debug!(memory_id = %id, "Forgot memory");
        }
        Ok(rows_affected > 0)
    }

    fn row_to_memory(row: &rusqlite::Row) -> Result<MemoryRecord> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let memory_type: String = row.get(3)?;
        let tags: Option<String> = row.get(5)?;
        let source: String = row.get(6)?;
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;

        Ok(MemoryRecord {
            id: parse_id(&id)?,
            user_id: parse_id(&user_id)?,
            memory_content: row.get(2)?,
            memory_type: memory_type.parse()?,
            importance_score: row.get(4)?,
            tags: tags.as_deref().map(serde_json::from_str).transpose()?,
            source: source.parse()?,
            is_active: row.get(7)?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })
    }
}
