use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use archivist_types::api::SweepReport;

use crate::status::ArchiveStatus;
use crate::storage::AttachmentStore;
use crate::store::ArchiveStore;

/// How long records live and how the sweep walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention_days: u32,
    pub interval: Duration,
    pub page_size: u32,
}

impl RetentionPolicy {
    /// Records saved strictly before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(TimeDelta::days(i64::from(self.retention_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Background task that prunes expired messages.
///
/// The first tick fires immediately, so a sweep runs at startup and then
/// once per `policy.interval`. A failed sweep is logged; the next tick
/// picks up whatever is still expired.
pub async fn run_retention_loop(
    store: Arc<dyn ArchiveStore>,
    policy: RetentionPolicy,
    status: Arc<ArchiveStatus>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(policy.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Retention loop stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        match sweep(store.as_ref(), Utc::now(), &policy).await {
            Ok(report) => {
                if report.records_deleted > 0 || report.files_removed > 0 {
                    info!(
                        "Retention: pruned {} messages and {} files older than {}",
                        report.records_deleted, report.files_removed, report.cutoff
                    );
                } else {
                    debug!("Retention: nothing older than {}", report.cutoff);
                }
                status.set_last_sweep(report).await;
            }
            Err(e) => {
                warn!("Retention sweep error: {:#}", e);
            }
        }
    }
}

/// Delete every message saved before `now - retention_days`, files first.
///
/// Expired records are walked page by page to remove their attachments.
/// File failures are counted and skipped. Records are then removed with a
/// single bulk delete using the same cutoff. A failure to list records
/// aborts before anything is deleted from the store; a failed bulk delete
/// is returned.
pub async fn sweep(
    store: &dyn ArchiveStore,
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> Result<SweepReport> {
    let cutoff = policy.cutoff(now);
    let page_size = policy.page_size.max(1);

    let mut scanned = 0u64;
    let mut files_removed = 0u64;
    let mut files_missing = 0u64;
    let mut file_errors = 0u64;

    let mut after = None;
    loop {
        let page = store.find_expired(cutoff, after, page_size).await?;
        let Some(last) = page.last() else {
            break;
        };
        after = Some(last.row_id);

        for stored in &page {
            scanned += 1;
            let Some(media_path) = stored.message.media_path.as_deref() else {
                continue;
            };

            match AttachmentStore::remove(Path::new(media_path)).await {
                Ok(true) => files_removed += 1,
                Ok(false) => files_missing += 1,
                Err(e) => {
                    warn!(
                        message_id = stored.message.message_id,
                        "Failed to delete media file {}: {}", media_path, e
                    );
                    file_errors += 1;
                }
            }
        }

        if page.len() < page_size as usize {
            break;
        }
    }

    let records_deleted = store.delete_expired(cutoff).await?;

    Ok(SweepReport {
        cutoff,
        finished_at: Utc::now(),
        scanned,
        files_removed,
        files_missing,
        file_errors,
        records_deleted,
    })
}
