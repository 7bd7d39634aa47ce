mod feed;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use archivist_db::Database;
use archivist_pipeline::{
    ArchiveConfig, ArchiveStatus, ArchiveStore, AttachmentStore, Pipeline, SqliteStore,
    run_retention_loop,
};

use crate::feed::{ApiClient, FeedSettings};
use crate::routes::StatusState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "archivist_server=debug,archivist_pipeline=debug,archivist_db=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    // Config
    let config = ArchiveConfig::from_env()?;
    let feed_settings = FeedSettings::from_env()?;
    let status_addr: Option<SocketAddr> = std::env::var("ARCHIVIST_STATUS_ADDR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.parse()
                .with_context(|| format!("ARCHIVIST_STATUS_ADDR is not an address: {v}"))
        })
        .transpose()?;

    // Init DB and media storage
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Arc::new(Database::open(&config.db_path)?);
    let store: Arc<dyn ArchiveStore> = Arc::new(SqliteStore::new(db));
    let attachments = Arc::new(AttachmentStore::new(config.media_dir.clone()).await?);
    let status = Arc::new(ArchiveStatus::default());

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Background retention sweep (once now, then every interval)
    let retention = tokio::spawn(run_retention_loop(
        store.clone(),
        config.retention_policy(),
        status.clone(),
        shutdown.clone(),
    ));
    info!(
        "Retention: {} days, sweep every {}s",
        config.retention_days,
        config.sweep_interval.as_secs()
    );

    if let Some(addr) = status_addr {
        let app = routes::router(StatusState {
            store: store.clone(),
            status: status.clone(),
            retention_days: config.retention_days,
        });
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Status endpoint listening on {}", addr);

        let token = shutdown.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!("Status endpoint failed: {}", e);
            }
        });
    }

    let client = Arc::new(ApiClient::new(&feed_settings));
    let pipeline = Pipeline::new(
        client,
        attachments,
        store,
        status,
        config.ingest_concurrency,
    );

    let result = feed::run_feed(&feed_settings, &pipeline, shutdown.clone()).await;

    // Feed is gone either way; finish what was dispatched and stop the sweeper.
    shutdown.cancel();
    pipeline.drain().await;
    retention.await.ok();
    info!("Archivist stopped");

    result
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
    token.cancel();
}
