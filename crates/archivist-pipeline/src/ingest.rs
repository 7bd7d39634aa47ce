use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use archivist_types::events::IncomingMessage;
use archivist_types::models::MessageKind;

use crate::classifier::Classifier;
use crate::client::MessagingClient;
use crate::status::ArchiveStatus;
use crate::storage::AttachmentStore;
use crate::store::ArchiveStore;

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Neither text nor attachment; nothing was written.
    Skipped,
    Archived { kind: MessageKind, media_saved: bool },
    /// The insert failed. The message is not in the archive.
    Dropped,
}

/// Turns feed events into archived records.
///
/// Cheap to clone; clones share the worker permits, the stores and the
/// status counters.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    classifier: Classifier,
    client: Arc<dyn MessagingClient>,
    attachments: Arc<AttachmentStore>,
    store: Arc<dyn ArchiveStore>,
    status: Arc<ArchiveStatus>,
    /// Bounds the number of in-flight ingestions
    permits: Arc<Semaphore>,
    capacity: u32,
}

impl Pipeline {
    /// `concurrency` is clamped to at least 1.
    pub fn new(
        client: Arc<dyn MessagingClient>,
        attachments: Arc<AttachmentStore>,
        store: Arc<dyn ArchiveStore>,
        status: Arc<ArchiveStatus>,
        concurrency: usize,
    ) -> Self {
        let capacity = u32::try_from(concurrency.max(1)).unwrap_or(u32::MAX);
        Self {
            inner: Arc::new(PipelineInner {
                classifier: Classifier::new(client.clone()),
                client,
                attachments,
                store,
                status,
                permits: Arc::new(Semaphore::new(capacity as usize)),
                capacity,
            }),
        }
    }

    /// Hand an event off to its own task and return.
    ///
    /// Waits only while all workers are busy, which pushes back on the
    /// feed reader instead of queueing without bound.
    pub async fn dispatch(&self, event: IncomingMessage) {
        let permit = match self.inner.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!(message_id = event.id, "Pipeline closed, event discarded");
                return;
            }
        };

        let pipeline = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            pipeline.ingest(event).await;
        });
    }

    /// Wait for every dispatched ingestion to finish.
    pub async fn drain(&self) {
        if let Ok(all) = self.inner.permits.acquire_many(self.inner.capacity).await {
            drop(all);
        }
    }

    /// Process one event: classify, save the attachment, insert the record.
    ///
    /// At most one file write and one insert. An attachment failure still
    /// archives the message (without `media_path`); an insert failure drops
    /// it.
    pub async fn ingest(&self, event: IncomingMessage) -> IngestOutcome {
        let stats = &self.inner.status.ingest;
        stats.record_received();

        let message_id = event.id;
        let Some(message) = self.inner.classifier.classify(event).await else {
            debug!(message_id, "Skipping event without text or media");
            stats.record_skipped();
            return IngestOutcome::Skipped;
        };

        let media_path = match &message.attachment {
            Some(attachment) => match self
                .inner
                .attachments
                .save(self.inner.client.as_ref(), message_id, attachment)
                .await
            {
                Ok(path) => Some(path.to_string_lossy().into_owned()),
                Err(e) => {
                    warn!(message_id, file_id = %attachment.file_id, "Attachment not saved: {}", e);
                    stats.record_media_failure();
                    None
                }
            },
            None => None,
        };

        let media_saved = media_path.is_some();
        let record = message.into_record(media_path, Utc::now());
        let kind = record.kind;

        match self.inner.store.insert(&record).await {
            Ok(()) => {
                debug!(
                    message_id,
                    chat_id = ?record.chat_id,
                    kind = kind.as_str(),
                    "Archived message"
                );
                stats.record_archived();
                IngestOutcome::Archived { kind, media_saved }
            }
            Err(e) => {
                // Best effort: no retry, no dead letter.
                error!(
                    message_id,
                    chat_id = ?record.chat_id,
                    media_path = ?record.media_path,
                    "Failed to archive message, dropping it: {:#}",
                    e
                );
                stats.record_dropped();
                IngestOutcome::Dropped
            }
        }
    }
}
