use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use archivist_types::events::{AttachmentRef, ChatInfo, PeerRef, SenderInfo};

/// The messaging-protocol client, as far as the archiver needs it.
///
/// Lookups return `Ok(None)` when the peer no longer exists (deleted
/// account, left chat) and `Err` for transport failures. The classifier
/// treats both the same way.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Fetch the full payload of an attachment.
    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Bytes>;

    async fn resolve_sender(&self, peer: &PeerRef) -> Result<Option<SenderInfo>>;

    async fn resolve_chat(&self, peer: &PeerRef) -> Result<Option<ChatInfo>>;
}
