//! Database row type for the `messages` table.
//! Distinct from archivist-types models to keep the DB layer's encoding
//! (epoch millis, kind as text) out of the domain type.

use anyhow::{Result, anyhow};
use archivist_types::models::{ArchivedMessage, MessageKind, StoredMessage};
use chrono::{DateTime, Utc};

pub struct MessageRow {
    pub id: i64,
    pub message_id: i64,
    pub date: i64,
    pub text: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub chat_id: Option<i64>,
    pub chat_name: Option<String>,
    pub media_path: Option<String>,
    pub kind: String,
    pub saved_at: i64,
}

impl MessageRow {
    pub fn into_stored(self) -> Result<StoredMessage> {
        let kind = MessageKind::from_kind(&self.kind)
            .ok_or_else(|| anyhow!("Corrupt kind '{}' on row {}", self.kind, self.id))?;
        Ok(StoredMessage {
            row_id: self.id,
            message: ArchivedMessage {
                message_id: self.message_id,
                date: from_millis(self.date, self.id)?,
                text: self.text,
                sender_id: self.sender_id,
                sender_username: self.sender_username,
                chat_id: self.chat_id,
                chat_name: self.chat_name,
                media_path: self.media_path,
                kind,
                saved_at: from_millis(self.saved_at, self.id)?,
            },
        })
    }
}

fn from_millis(millis: i64, row_id: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("Corrupt timestamp {} on row {}", millis, row_id))
}
