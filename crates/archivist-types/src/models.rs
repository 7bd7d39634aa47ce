use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an archived message carried an attachment reference.
///
/// Derived from the incoming event alone, so a `Media` record may still
/// have no `media_path` when the download failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Media,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Media => "media",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "text" => Some(Self::Text),
            "media" => Some(Self::Media),
            _ => None,
        }
    }
}

/// A message as it is persisted in the archive.
///
/// Records are write-once: the pipeline inserts them, the retention sweep
/// deletes them, nothing updates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub message_id: i64,
    pub date: DateTime<Utc>,
    pub text: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub chat_id: Option<i64>,
    pub chat_name: Option<String>,
    pub media_path: Option<String>,
    pub kind: MessageKind,
    /// Archival time. The retention sweep filters on this field only.
    pub saved_at: DateTime<Utc>,
}

/// An archived message together with its store-assigned row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub row_id: i64,
    pub message: ArchivedMessage,
}
