use crate::Database;
use crate::models::MessageRow;
use anyhow::Result;
use archivist_types::models::{ArchivedMessage, StoredMessage};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

impl Database {
    // -- Ingestion --

    /// Insert one archived message. Returns the new row id.
    pub fn insert_message(&self, msg: &ArchivedMessage) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (
                    message_id, date, text, sender_id, sender_username,
                    chat_id, chat_name, media_path, kind, saved_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    msg.message_id,
                    msg.date.timestamp_millis(),
                    msg.text,
                    msg.sender_id,
                    msg.sender_username,
                    msg.chat_id,
                    msg.chat_name,
                    msg.media_path,
                    msg.kind.as_str(),
                    msg.saved_at.timestamp_millis(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    // -- Retention --

    /// One page of records with `saved_at` strictly before `cutoff`,
    /// ordered by row id and starting after `after` (keyset cursor).
    pub fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<i64>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>> {
        self.with_conn(|conn| query_expired(conn, cutoff.timestamp_millis(), after.unwrap_or(0), limit))
    }

    /// Delete every record with `saved_at` strictly before `cutoff`.
    /// Uses the same comparison as [`Database::find_expired`].
    pub fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM messages WHERE saved_at < ?1",
                [cutoff.timestamp_millis()],
            )?;
            Ok(deleted as u64)
        })
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }
}

fn query_expired(conn: &Connection, cutoff_ms: i64, after: i64, limit: u32) -> Result<Vec<StoredMessage>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, message_id, date, text, sender_id, sender_username,
                chat_id, chat_name, media_path, kind, saved_at
         FROM messages
         WHERE saved_at < ?1 AND id > ?2
         ORDER BY id
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![cutoff_ms, after, limit], message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(MessageRow::into_stored).collect()
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        date: row.get(2)?,
        text: row.get(3)?,
        sender_id: row.get(4)?,
        sender_username: row.get(5)?,
        chat_id: row.get(6)?,
        chat_name: row.get(7)?,
        media_path: row.get(8)?,
        kind: row.get(9)?,
        saved_at: row.get(10)?,
    })
}
