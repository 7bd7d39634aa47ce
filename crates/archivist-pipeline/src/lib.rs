//! The archival core: classify incoming messages, persist their media and
//! metadata, and prune everything older than the retention window.

pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod retention;
pub mod status;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

pub use classifier::{Classifier, NormalizedMessage};
pub use client::MessagingClient;
pub use config::ArchiveConfig;
pub use error::AttachmentError;
pub use ingest::{IngestOutcome, Pipeline};
pub use retention::{RetentionPolicy, run_retention_loop, sweep};
pub use status::{ArchiveStatus, IngestStats};
pub use storage::AttachmentStore;
pub use store::{ArchiveStore, SqliteStore};
