//! Fakes shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use archivist_types::events::{
    AttachmentKind, AttachmentRef, ChatInfo, IncomingMessage, PeerRef, SenderInfo,
};
use archivist_types::models::{ArchivedMessage, StoredMessage};

use crate::client::MessagingClient;
use crate::store::ArchiveStore;

#[derive(Default)]
pub struct FakeClient {
    payloads: HashMap<String, Vec<u8>>,
    senders: HashMap<i64, SenderInfo>,
    chats: HashMap<i64, ChatInfo>,
    fail_lookups: bool,
}

impl FakeClient {
    pub fn with_payload(mut self, file_id: &str, data: &[u8]) -> Self {
        self.payloads.insert(file_id.to_string(), data.to_vec());
        self
    }

    pub fn with_sender(mut self, id: i64, username: &str) -> Self {
        self.senders.insert(
            id,
            SenderInfo {
                id,
                username: Some(username.to_string()),
            },
        );
        self
    }

    pub fn with_chat(mut self, id: i64, title: &str) -> Self {
        self.chats.insert(
            id,
            ChatInfo {
                id,
                title: Some(title.to_string()),
            },
        );
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Bytes> {
        match self.payloads.get(&attachment.file_id) {
            Some(data) => Ok(Bytes::from(data.clone())),
            None => bail!("file {} is not available", attachment.file_id),
        }
    }

    async fn resolve_sender(&self, peer: &PeerRef) -> Result<Option<SenderInfo>> {
        if self.fail_lookups {
            bail!("connection reset");
        }
        Ok(self.senders.get(&peer.id).cloned())
    }

    async fn resolve_chat(&self, peer: &PeerRef) -> Result<Option<ChatInfo>> {
        if self.fail_lookups {
            bail!("connection reset");
        }
        Ok(self.chats.get(&peer.id).cloned())
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingStore {
    pub inserts: AtomicUsize,
}

#[async_trait]
impl ArchiveStore for FailingStore {
    async fn insert(&self, _message: &ArchivedMessage) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        bail!("database is locked")
    }

    async fn find_expired(
        &self,
        _cutoff: DateTime<Utc>,
        _after: Option<i64>,
        _limit: u32,
    ) -> Result<Vec<StoredMessage>> {
        Ok(Vec::new())
    }

    async fn delete_expired(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        bail!("database is locked")
    }

    async fn count(&self) -> Result<u64> {
        Ok(0)
    }
}

/// Store whose reads fail; counts the deletes it is asked for.
#[derive(Default)]
pub struct UnreadableStore {
    pub deletes: AtomicUsize,
}

#[async_trait]
impl ArchiveStore for UnreadableStore {
    async fn insert(&self, _message: &ArchivedMessage) -> Result<()> {
        Ok(())
    }

    async fn find_expired(
        &self,
        _cutoff: DateTime<Utc>,
        _after: Option<i64>,
        _limit: u32,
    ) -> Result<Vec<StoredMessage>> {
        bail!("disk I/O error")
    }

    async fn delete_expired(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn count(&self) -> Result<u64> {
        Ok(0)
    }
}

/// An event from sender 7 in chat -100.
pub fn incoming(id: i64, text: Option<&str>, media: Option<AttachmentRef>) -> IncomingMessage {
    IncomingMessage {
        id,
        date: Utc::now(),
        text: text.map(String::from),
        media,
        sender: Some(PeerRef { id: 7 }),
        chat: Some(PeerRef { id: -100 }),
    }
}

pub fn photo(file_id: &str) -> AttachmentRef {
    AttachmentRef {
        file_id: file_id.to_string(),
        kind: AttachmentKind::Photo,
        mime_type: None,
        attributes: Vec::new(),
        size: None,
    }
}

pub fn document(file_id: &str, mime: &str) -> AttachmentRef {
    AttachmentRef {
        file_id: file_id.to_string(),
        kind: AttachmentKind::Document,
        mime_type: Some(mime.to_string()),
        attributes: Vec::new(),
        size: None,
    }
}
