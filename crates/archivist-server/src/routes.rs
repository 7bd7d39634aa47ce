use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use tower_http::trace::TraceLayer;
use tracing::error;

use archivist_pipeline::{ArchiveStatus, ArchiveStore};
use archivist_types::api::StatusResponse;

/// Shared state for the status endpoint.
#[derive(Clone)]
pub struct StatusState {
    pub store: Arc<dyn ArchiveStore>,
    pub status: Arc<ArchiveStatus>,
    pub retention_days: u32,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<StatusState>) -> Result<Json<StatusResponse>, StatusCode> {
    let archived_records = state.store.count().await.map_err(|e| {
        error!("Status count failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(StatusResponse {
        retention_days: state.retention_days,
        archived_records,
        ingest: state.status.ingest.snapshot(),
        last_sweep: state.status.last_sweep().await,
    }))
}
