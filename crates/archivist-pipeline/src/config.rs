use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::retention::RetentionPolicy;

pub const DEFAULT_RETENTION_DAYS: u32 = 7;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_SWEEP_PAGE_SIZE: u32 = 500;
const DEFAULT_INGEST_CONCURRENCY: usize = 16;

/// Archiver settings, read once at startup and shared read-only by the
/// ingestion pipeline and the retention sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub retention_days: u32,
    pub media_dir: PathBuf,
    pub db_path: PathBuf,
    pub sweep_interval: Duration,
    pub sweep_page_size: u32,
    pub ingest_concurrency: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            media_dir: PathBuf::from("./media"),
            db_path: PathBuf::from("archive.db"),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_page_size: DEFAULT_SWEEP_PAGE_SIZE,
            ingest_concurrency: DEFAULT_INGEST_CONCURRENCY,
        }
    }
}

impl ArchiveConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process
    /// environment in production).
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // Fractional windows truncate to whole days. Unset, garbage and
        // anything under one day mean "use the default window".
        let retention_days = get("RETENTION_DAYS")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|days| days.is_finite() && *days >= 1.0)
            .map(|days| days.trunc().min(f64::from(u32::MAX)) as u32)
            .unwrap_or(DEFAULT_RETENTION_DAYS);

        let media_dir = get("ARCHIVIST_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.media_dir);
        let db_path = get("ARCHIVIST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let sweep_interval = match get("ARCHIVIST_SWEEP_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse()
                    .with_context(|| format!("ARCHIVIST_SWEEP_INTERVAL_SECS is not a number: {v}"))?,
            ),
            None => defaults.sweep_interval,
        };
        let sweep_page_size = match get("ARCHIVIST_SWEEP_PAGE_SIZE") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("ARCHIVIST_SWEEP_PAGE_SIZE is not a number: {v}"))?,
            None => defaults.sweep_page_size,
        };
        let ingest_concurrency = match get("ARCHIVIST_INGEST_CONCURRENCY") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("ARCHIVIST_INGEST_CONCURRENCY is not a number: {v}"))?,
            None => defaults.ingest_concurrency,
        };

        if sweep_interval.is_zero() {
            bail!("ARCHIVIST_SWEEP_INTERVAL_SECS must be greater than zero");
        }
        if sweep_page_size == 0 {
            bail!("ARCHIVIST_SWEEP_PAGE_SIZE must be greater than zero");
        }
        if ingest_concurrency == 0 || u32::try_from(ingest_concurrency).is_err() {
            bail!("ARCHIVIST_INGEST_CONCURRENCY must be between 1 and {}", u32::MAX);
        }

        Ok(Self {
            retention_days,
            media_dir,
            db_path,
            sweep_interval,
            sweep_page_size,
            ingest_concurrency,
        })
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention_days: self.retention_days,
            interval: self.sweep_interval,
            page_size: self.sweep_page_size,
        }
    }
}
