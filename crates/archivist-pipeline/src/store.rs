use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;

use archivist_db::Database;
use archivist_types::models::{ArchivedMessage, StoredMessage};

/// Persistent home of archived messages.
///
/// Both `find_expired` and `delete_expired` must use the same strict
/// `saved_at < cutoff` comparison.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn insert(&self, message: &ArchivedMessage) -> Result<()>;

    /// One keyset page of expired records, ordered by row id, starting
    /// strictly after `after`.
    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<i64>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>>;

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn count(&self) -> Result<u64>;
}

/// [`ArchiveStore`] backed by the SQLite archive database.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run a blocking DB call off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&*db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                anyhow!("DB task failed: {}", e)
            })?
    }
}

#[async_trait]
impl ArchiveStore for SqliteStore {
    async fn insert(&self, message: &ArchivedMessage) -> Result<()> {
        let message = message.clone();
        self.blocking(move |db| db.insert_message(&message).map(|_| ()))
            .await
    }

    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<i64>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>> {
        self.blocking(move |db| db.find_expired(cutoff, after, limit))
            .await
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.blocking(move |db| db.delete_expired(cutoff)).await
    }

    async fn count(&self) -> Result<u64> {
        self.blocking(|db| db.count_messages()).await
    }
}
