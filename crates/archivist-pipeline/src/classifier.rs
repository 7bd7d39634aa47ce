use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use archivist_types::events::{AttachmentRef, ChatInfo, IncomingMessage, PeerRef, SenderInfo};
use archivist_types::models::{ArchivedMessage, MessageKind};

use crate::client::MessagingClient;

/// An incoming message that qualified for archiving, with its sender and
/// chat metadata resolved as far as possible.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub message_id: i64,
    pub date: DateTime<Utc>,
    pub text: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub chat_id: Option<i64>,
    pub chat_name: Option<String>,
    pub attachment: Option<AttachmentRef>,
    pub kind: MessageKind,
}

impl NormalizedMessage {
    /// Build the persisted record. `media_path` is whatever the attachment
    /// store produced; `None` is valid for either kind.
    pub fn into_record(self, media_path: Option<String>, saved_at: DateTime<Utc>) -> ArchivedMessage {
        ArchivedMessage {
            message_id: self.message_id,
            date: self.date,
            text: self.text,
            sender_id: self.sender_id,
            sender_username: self.sender_username,
            chat_id: self.chat_id,
            chat_name: self.chat_name,
            media_path,
            kind: self.kind,
            saved_at,
        }
    }
}

/// Decides which events are worth archiving and normalizes them.
#[derive(Clone)]
pub struct Classifier {
    client: Arc<dyn MessagingClient>,
}

impl Classifier {
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        Self { client }
    }

    /// Returns `None` for events with neither text nor an attachment.
    /// Lookup failures only blank out the sender/chat fields.
    pub async fn classify(&self, event: IncomingMessage) -> Option<NormalizedMessage> {
        let text = event.text.filter(|t| !t.is_empty());
        if text.is_none() && event.media.is_none() {
            return None;
        }

        let (sender, chat) = tokio::join!(
            self.lookup_sender(event.id, event.sender),
            self.lookup_chat(event.id, event.chat),
        );

        let kind = if event.media.is_some() {
            MessageKind::Media
        } else {
            MessageKind::Text
        };

        Some(NormalizedMessage {
            message_id: event.id,
            date: event.date,
            text,
            sender_id: sender.as_ref().map(|s| s.id),
            sender_username: sender.and_then(|s| s.username),
            chat_id: chat.as_ref().map(|c| c.id),
            chat_name: chat.and_then(|c| c.title),
            attachment: event.media,
            kind,
        })
    }

    async fn lookup_sender(&self, message_id: i64, peer: Option<PeerRef>) -> Option<SenderInfo> {
        let peer = peer?;
        match self.client.resolve_sender(&peer).await {
            Ok(Some(sender)) => Some(sender),
            Ok(None) => {
                debug!(message_id, sender = peer.id, "Sender no longer resolvable");
                None
            }
            Err(e) => {
                warn!(message_id, sender = peer.id, "Sender lookup failed: {:#}", e);
                None
            }
        }
    }

    async fn lookup_chat(&self, message_id: i64, peer: Option<PeerRef>) -> Option<ChatInfo> {
        let peer = peer?;
        match self.client.resolve_chat(&peer).await {
            Ok(Some(chat)) => Some(chat),
            Ok(None) => {
                debug!(message_id, chat = peer.id, "Chat no longer resolvable");
                None
            }
            Err(e) => {
                warn!(message_id, chat = peer.id, "Chat lookup failed: {:#}", e);
                None
            }
        }
    }
}
