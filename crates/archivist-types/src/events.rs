use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events sent by the messaging feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedEvent {
    /// Feed accepted the identify token
    Ready { account_id: i64 },

    /// A new message arrived in any chat the account can see
    NewMessage { message: IncomingMessage },
}

/// Commands sent FROM the archiver TO the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedCommand {
    /// Authenticate the feed connection
    Identify { token: String },
}

/// A raw message event, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<AttachmentRef>,
    #[serde(default)]
    pub sender: Option<PeerRef>,
    #[serde(default)]
    pub chat: Option<PeerRef>,
}

/// Reference to a user or chat that can be resolved through the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: i64,
}

/// Reference to a downloadable attachment, as described by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_id: String,
    pub kind: AttachmentKind,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttachmentAttribute>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl AttachmentRef {
    /// First filename carried in the attachment attributes, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attr| match attr {
            AttachmentAttribute::Filename { file_name } => Some(file_name.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Photo,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentAttribute {
    Filename { file_name: String },
    Audio {
        duration_secs: u32,
        #[serde(default)]
        voice: bool,
    },
    Video {
        duration_secs: u32,
        width: u32,
        height: u32,
    },
    ImageSize { width: u32, height: u32 },
    #[serde(other)]
    Unknown,
}

/// Resolved sender of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Resolved chat a message was posted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}
