//! Chats, their messages and generation stream ids.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use tracing::debug;
use uuid::Uuid;

use dhruv_types::ChatRole;

use crate::error::Result;
use crate::types::{Chat, StoredMessage};

use super::{Store, parse_id, parse_ts, ts};

impl Store {
    // ─────────────────────────────────────────────────────────────────────
    // Chats
    // ─────────────────────────────────────────────────────────────────────

    pub fn save_chat(&self, chat: &Chat) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO chats (id, user_id, title, visibility, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                chat.id.to_string(),
                chat.user_id.to_string(),
                chat.title,
                chat.visibility.as_str(),
                ts(&chat.created_at),
            ],
        )?;

        debug!(chat_id = %chat.id, user_id = %chat.user_id, "Saved chat");
        Ok(())
    }

    pub fn get_chat(&self, id: Uuid) -> Result<Option<Chat>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, visibility, created_at FROM chats WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id.to_string()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_chat(row)?)),
            None => Ok(None),
        }
    }

    /// Chats owned by `user_id`, newest first.
    pub fn chats_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<Chat>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, title, visibility, created_at
            FROM chats
            WHERE user_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), limit as i64])?;

        let mut chats = Vec::new();
        while let Some(row) = rows.next()? {
            chats.push(Self::row_to_chat(row)?);
        }
        Ok(chats)
    }

    /// Delete a chat with its messages and streams. Returns the deleted chat.
    pub fn delete_chat(&self, id: Uuid) -> Result<Option<Chat>> {
        let Some(chat) = self.get_chat(id)? else {
            return Ok(None);
        };

        self.with_transaction(|conn| {
            let id = id.to_string();
            conn.execute("DELETE FROM messages WHERE chat_id = ?1", params![id])?;
            conn.execute("DELETE FROM streams WHERE chat_id = ?1", params![id])?;
            conn.execute("DELETE FROM chats WHERE id = ?1", params![id])?;
            Ok(())
        })?;

        debug!(chat_id = %chat.id, "Deleted chat");
        Ok(Some(chat))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────

    /// Insert messages atomically.
    pub fn save_messages(&self, messages: &[StoredMessage]) -> Result<()> {
        self.with_transaction(|conn| {
            for message in messages {
                conn.execute(
                    r#"
                    INSERT INTO messages (id, chat_id, role, parts, attachments, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        message.id.to_string(),
                        message.chat_id.to_string(),
                        message.role.as_str(),
                        serde_json::to_string(&message.parts)?,
                        serde_json::to_string(&message.attachments)?,
                        ts(&message.created_at),
                    ],
                )?;
            }
            Ok(())
        })?;

        debug!(count = messages.len(), "Saved messages");
        Ok(())
    }

    /// Messages of a chat, oldest first.
    pub fn messages_for_chat(&self, chat_id: Uuid) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, chat_id, role, parts, attachments, created_at
            FROM messages
            WHERE chat_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let mut rows = stmt.query(params![chat_id.to_string()])?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(Self::row_to_message(row)?);
        }
        Ok(messages)
    }

    pub fn latest_message(&self, chat_id: Uuid) -> Result<Option<StoredMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, chat_id, role, parts, attachments, created_at
            FROM messages
            WHERE chat_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query(params![chat_id.to_string()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_message(row)?)),
            None => Ok(None),
        }
    }

    /// User-authored messages across all of a user's chats within the
    /// trailing `window`.
    pub fn count_user_messages(&self, user_id: Uuid, window: Duration) -> Result<u32> {
        self.count_user_messages_since(user_id, super::now() - window)
    }

    pub fn count_user_messages_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM messages m
            JOIN chats c ON c.id = m.chat_id
            WHERE c.user_id = ?1 AND m.role = ?2 AND m.created_at >= ?3
            "#,
            params![user_id.to_string(), ChatRole::User.as_str(), ts(&since)],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Streams
    // ─────────────────────────────────────────────────────────────────────

    pub fn create_stream(&self, stream_id: Uuid, chat_id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO streams (id, chat_id, created_at) VALUES (?1, ?2, ?3)",
            params![stream_id.to_string(), chat_id.to_string(), ts(&super::now())],
        )?;
        debug!(stream_id = %stream_id, chat_id = %chat_id, "Recorded stream");
        Ok(())
    }

    /// Stream ids of a chat, oldest first.
    pub fn stream_ids(&self, chat_id: Uuid) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id FROM streams WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let mut rows = stmt.query(params![chat_id.to_string()])?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            ids.push(parse_id(&id)?);
        }
        Ok(ids)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Row Mapping
    // ─────────────────────────────────────────────────────────────────────

    fn row_to_chat(row: &rusqlite::Row) -> Result<Chat> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let visibility: String = row.get(3)?;
        let created_at: String = row.get(4)?;

        Ok(Chat {
            id: parse_id(&id)?,
            user_id: parse_id(&user_id)?,
            title: row.get(2)?,
            visibility: visibility.parse()?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> Result<StoredMessage> {
        let id: String = row.get(0)?;
        let chat_id: String = row.get(1)?;
        let role: String = row.get(2)?;
        let parts: String = row.get(3)?;
        let attachments: String = row.get(4)?;
        let created_at: String = row.get(5)?;

        Ok(StoredMessage {
            id: parse_id(&id)?,
            chat_id: parse_id(&chat_id)?,
            role: role.parse()?,
            parts: serde_json::from_str(&parts)?,
            attachments: serde_json::from_str(&attachments)?,
            created_at: parse_ts(&created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store_with_user, utc};
    use super::*;
    use dhruv_types::{UserKind, Visibility};
    use serde_json::json;

    fn text_message(chat_id: Uuid, role: ChatRole, text: &str) -> StoredMessage {
        StoredMessage::new(
            Uuid::new_v4(),
            chat_id,
            role,
            json!([{"type": "text", "text": text}]),
        )
    }

    fn chat_for(store: &Store, user_id: Uuid) -> Chat {
        let chat = Chat::new(Uuid::new_v4(), user_id, "Water goals", Visibility::Private);
        store.save_chat(&chat).unwrap();
        chat
    }

    #[test]
    fn test_save_and_get_chat() {
        let (store, user_id) = store_with_user();
        let chat = chat_for(&store, user_id);

        let fetched = store.get_chat(chat.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Water goals");
        assert_eq!(fetched.visibility, Visibility::Private);
        assert_eq!(fetched.user_id, user_id);
        assert!(store.get_chat(Uuid::new_v4()).unwrap().is_none());
        assert_eq!(store.chats_for_user(user_id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_messages_in_order() {
        let (store, user_id) = store_with_user();
        let chat = chat_for(&store, user_id);

        let mut first = text_message(chat.id, ChatRole::User, "hi");
        first.created_at = utc("2026-03-10T10:00:00Z");
        let mut second = text_message(chat.id, ChatRole::Assistant, "hello");
        second.created_at = utc("2026-03-10T10:00:02Z");
        store.save_messages(&[second.clone(), first.clone()]).unwrap();

        let messages = store.messages_for_chat(chat.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, first.id);
        assert_eq!(messages[1].text(), "hello");

        let latest = store.latest_message(chat.id).unwrap().unwrap();
        assert_eq!(latest.role, ChatRole::Assistant);
    }

    #[test]
    fn test_save_messages_is_atomic() {
        let (store, user_id) = store_with_user();
        let chat = chat_for(&store, user_id);
        let message = text_message(chat.id, ChatRole::User, "hi");

        let err = store.save_messages(&[message.clone(), message]);
        assert!(err.is_err());
        assert!(store.messages_for_chat(chat.id).unwrap().is_empty());
    }

    #[test]
    fn test_count_user_messages_only_counts_user_role_in_window() {
        let (store, user_id) = store_with_user();
        let chat = chat_for(&store, user_id);

        let mut old = text_message(chat.id, ChatRole::User, "yesterday");
        old.created_at = Utc::now() - Duration::hours(30);
        store
            .save_messages(&[
                old,
                text_message(chat.id, ChatRole::User, "one"),
                text_message(chat.id, ChatRole::User, "two"),
                text_message(chat.id, ChatRole::Assistant, "reply"),
            ])
            .unwrap();

        let other = store.create_user("other@example.com", UserKind::Regular).unwrap();
        let other_chat = chat_for(&store, other.id);
        store
            .save_messages(&[text_message(other_chat.id, ChatRole::User, "x")])
            .unwrap();

        assert_eq!(store.count_user_messages(user_id, Duration::hours(24)).unwrap(), 2);
    }

    #[test]
    fn test_stream_ids_ordered() {
        let (store, user_id) = store_with_user();
        let chat = chat_for(&store, user_id);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.create_stream(a, chat.id).unwrap();
        store.create_stream(b, chat.id).unwrap();

        assert_eq!(store.stream_ids(chat.id).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_delete_chat_cascades() {
        let (store, user_id) = store_with_user();
        let chat = chat_for(&store, user_id);
        store
            .save_messages(&[text_message(chat.id, ChatRole::User, "hi")])
            .unwrap();
        store.create_stream(Uuid::new_v4(), chat.id).unwrap();

        let deleted = store.delete_chat(chat.id).unwrap().unwrap();
        assert_eq!(deleted.id, chat.id);
        assert!(store.get_chat(chat.id).unwrap().is_none());
        assert!(store.messages_for_chat(chat.id).unwrap().is_empty());
        assert!(store.stream_ids(chat.id).unwrap().is_empty());

        assert!(store.delete_chat(chat.id).unwrap().is_none());
    }
}
