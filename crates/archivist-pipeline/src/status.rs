use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use archivist_types::api::{IngestCounters, SweepReport};

/// Counters for the ingestion pipeline. Relaxed ordering: these are
/// reported, never used for control flow.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    skipped: AtomicU64,
    archived: AtomicU64,
    media_failures: AtomicU64,
    dropped: AtomicU64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestCounters {
        IngestCounters {
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            archived: self.archived.load(Ordering::Relaxed),
            media_failures: self.media_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_archived(&self) {
        self.archived.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_media_failure(&self) {
        self.media_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Shared view of what the archiver has been doing, for the status endpoint.
#[derive(Debug, Default)]
pub struct ArchiveStatus {
    pub ingest: IngestStats,
    last_sweep: RwLock<Option<SweepReport>>,
}

impl ArchiveStatus {
    pub async fn last_sweep(&self) -> Option<SweepReport> {
        self.last_sweep.read().await.clone()
    }

    pub(crate) async fn set_last_sweep(&self, report: SweepReport) {
        *self.last_sweep.write().await = Some(report);
    }
}
