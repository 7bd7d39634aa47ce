use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Status endpoint --

/// Snapshot of the ingestion counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounters {
    pub received: u64,
    pub skipped: u64,
    pub archived: u64,
    pub media_failures: u64,
    pub dropped: u64,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub cutoff: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Expired records visited while removing files
    pub scanned: u64,
    pub files_removed: u64,
    /// Files that were already gone from disk
    pub files_missing: u64,
    pub file_errors: u64,
    pub records_deleted: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub retention_days: u32,
    pub archived_records: u64,
    pub ingest: IngestCounters,
    pub last_sweep: Option<SweepReport>,
}
