//! Thin adapter for the messaging service: a WebSocket event feed plus an
//! HTTP API for attachment downloads and peer lookups.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use archivist_pipeline::{MessagingClient, Pipeline};
use archivist_types::events::{
    AttachmentRef, ChatInfo, FeedCommand, FeedEvent, PeerRef, SenderInfo,
};

/// Connection settings for the messaging service.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub feed_url: String,
    pub api_url: Url,
    pub token: String,
}

impl FeedSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} is not set"))
        };

        let feed_url = required("ARCHIVIST_FEED_URL")?;
        let api_url = required("ARCHIVIST_API_URL")?;
        let token = required("ARCHIVIST_FEED_TOKEN")?;

        let api_url = Url::parse(&api_url)
            .with_context(|| format!("ARCHIVIST_API_URL is not a valid URL: {api_url}"))?;
        if api_url.cannot_be_a_base() {
            bail!("ARCHIVIST_API_URL cannot be used as a base URL: {api_url}");
        }

        Ok(Self {
            feed_url,
            api_url,
            token,
        })
    }
}

/// [`MessagingClient`] over the service's HTTP API.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl ApiClient {
    pub fn new(settings: &FeedSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: settings.api_url.clone(),
            token: settings.token.clone(),
        }
    }

    /// `{base}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        self.http
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))
    }

    /// GET a JSON resource; 404 means the peer is gone.
    async fn lookup<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let resp = self.get(url.clone()).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => bail!("Lookup {url} failed ({status})"),
        }
    }
}

#[async_trait]
impl MessagingClient for ApiClient {
    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Bytes> {
        let url = self.endpoint(&["files", &attachment.file_id]);
        let resp = self.get(url).await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Download of {} failed ({})", attachment.file_id, status);
        }
        Ok(resp.bytes().await?)
    }

    async fn resolve_sender(&self, peer: &PeerRef) -> Result<Option<SenderInfo>> {
        let url = self.endpoint(&["users", &peer.id.to_string()]);
        self.lookup(url).await
    }

    async fn resolve_chat(&self, peer: &PeerRef) -> Result<Option<ChatInfo>> {
        let url = self.endpoint(&["chats", &peer.id.to_string()]);
        self.lookup(url).await
    }
}

/// Read the feed until it closes or `shutdown` fires, dispatching every
/// new message into the pipeline.
pub async fn run_feed(
    settings: &FeedSettings,
    pipeline: &Pipeline,
    shutdown: CancellationToken,
) -> Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(settings.feed_url.as_str())
        .await
        .with_context(|| format!("Feed connect to {} failed", settings.feed_url))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let identify = serde_json::to_string(&FeedCommand::Identify {
        token: settings.token.clone(),
    })?;
    ws_tx.send(Message::text(identify)).await?;
    info!("Connected to feed at {}", settings.feed_url);

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Feed reader stopping");
                let _ = ws_tx.send(Message::Close(None)).await;
                return Ok(());
            }
            frame = ws_rx.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<FeedEvent>(text.as_str()) {
                Ok(FeedEvent::Ready { account_id }) => {
                    info!(account_id, "Feed ready, archiving started");
                }
                Ok(FeedEvent::NewMessage { message }) => {
                    let message_id = message.id;
                    // A full pool must not hold up shutdown.
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            warn!(message_id, "Shutdown while waiting for a worker, event discarded");
                            let _ = ws_tx.send(Message::Close(None)).await;
                            return Ok(());
                        }
                        _ = pipeline.dispatch(message) => {}
                    }
                }
                Err(e) => {
                    debug!("Ignoring feed frame: {}", e);
                }
            },
            Some(Ok(Message::Close(frame))) => {
                warn!("Feed closed by server: {:?}", frame);
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e).context("Feed read failed"),
            None => {
                warn!("Feed stream ended");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use archivist_db::Database;
    use archivist_pipeline::{
        ArchiveStatus, ArchiveStore, AttachmentStore, Classifier, SqliteStore,
    };
    use archivist_types::events::IncomingMessage;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<FeedSettings> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FeedSettings::from_lookup(|key| env.get(key).cloned())
    }

    fn valid() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ARCHIVIST_FEED_URL", "wss://feed.example.com/gateway"),
            ("ARCHIVIST_API_URL", "https://api.example.com/v1/"),
            ("ARCHIVIST_FEED_TOKEN", "secret"),
        ]
    }

    #[test]
    fn settings_require_all_variables() {
        assert!(settings_from(&valid()).is_ok());

        for missing in ["ARCHIVIST_FEED_URL", "ARCHIVIST_API_URL", "ARCHIVIST_FEED_TOKEN"] {
            let pairs: Vec<_> = valid().into_iter().filter(|(k, _)| *k != missing).collect();
            let err = settings_from(&pairs).unwrap_err();
            assert!(err.to_string().contains(missing), "{err}");
        }
    }

    #[test]
    fn settings_reject_unusable_api_url() {
        let mut pairs = valid();
        pairs[1] = ("ARCHIVIST_API_URL", "mailto:ops@example.com");
        assert!(settings_from(&pairs).is_err());
    }

    #[test]
    fn endpoints_are_appended_and_escaped() {
        let client = ApiClient::new(&settings_from(&valid()).unwrap());

        assert_eq!(
            client.endpoint(&["users", "42"]).as_str(),
            "https://api.example.com/v1/users/42"
        );
        assert_eq!(
            client.endpoint(&["files", "../etc/passwd"]).as_str(),
            "https://api.example.com/v1/files/..%2Fetc%2Fpasswd"
        );
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret")
    }

    async fn user(headers: HeaderMap, Path(id): Path<i64>) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match id {
            7 => Json(SenderInfo {
                id: 7,
                username: Some("alice".into()),
            })
            .into_response(),
            9 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn chat(headers: HeaderMap, Path(id): Path<i64>) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match id {
            -100 => Json(ChatInfo {
                id: -100,
                title: Some("general".into()),
            })
            .into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn file(headers: HeaderMap, Path(file_id): Path<String>) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match file_id.as_str() {
            "doc-1" => b"%PDF-1.7".as_slice().into_response(),
            "boom" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Serve a fake messaging API on a random local port.
    async fn api_client(token: &str) -> ApiClient {
        let app = Router::new()
            .route("/v1/users/{id}", get(user))
            .route("/v1/chats/{id}", get(chat))
            .route("/v1/files/{file_id}", get(file));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        ApiClient::new(&FeedSettings {
            feed_url: "ws://127.0.0.1:1".into(),
            api_url: Url::parse(&format!("http://{addr}/v1/")).unwrap(),
            token: token.into(),
        })
    }

    #[tokio::test]
    async fn lookups_map_status_codes() {
        let client = api_client("secret").await;

        let alice = client.resolve_sender(&PeerRef { id: 7 }).await.unwrap();
        assert_eq!(alice.and_then(|s| s.username).as_deref(), Some("alice"));

        assert!(client.resolve_sender(&PeerRef { id: 8 }).await.unwrap().is_none());

        let err = client.resolve_sender(&PeerRef { id: 9 }).await.unwrap_err();
        assert!(err.to_string().contains("500"), "{err}");

        let general = client.resolve_chat(&PeerRef { id: -100 }).await.unwrap();
        assert_eq!(general.and_then(|c| c.title).as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn downloads_fail_on_error_status() {
        let client = api_client("secret").await;
        let attachment = |file_id: &str| AttachmentRef {
            file_id: file_id.into(),
            kind: archivist_types::events::AttachmentKind::Document,
            mime_type: None,
            attributes: Vec::new(),
            size: None,
        };

        let bytes = client.download_attachment(&attachment("doc-1")).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.7");

        let err = client.download_attachment(&attachment("gone")).await.unwrap_err();
        assert!(err.to_string().contains("404"), "{err}");
        let err = client.download_attachment(&attachment("boom")).await.unwrap_err();
        assert!(err.to_string().contains("500"), "{err}");
    }

    #[tokio::test]
    async fn rejected_token_is_an_error_not_a_missing_peer() {
        let client = api_client("stale").await;
        assert!(client.resolve_sender(&PeerRef { id: 7 }).await.is_err());
    }

    #[tokio::test]
    async fn failed_lookup_blanks_sender_fields() {
        let classifier = Classifier::new(Arc::new(api_client("secret").await));
        let event: IncomingMessage = serde_json::from_value(serde_json::json!({
            "id": 5,
            "date": "2026-10-01T12:00:00Z",
            "text": "hi",
            "sender": {"id": 9},
            "chat": {"id": -100}
        }))
        .unwrap();

        let message = classifier.classify(event).await.unwrap();

        assert_eq!(message.sender_id, None);
        assert_eq!(message.sender_username, None);
        assert_eq!(message.chat_id, Some(-100));
        assert_eq!(message.chat_name.as_deref(), Some("general"));
    }

    /// Client with no peers. With `stall` set, downloads never finish.
    struct QuietClient {
        stall: bool,
    }

    #[async_trait]
    impl MessagingClient for QuietClient {
        async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Bytes> {
            if self.stall {
                std::future::pending::<()>().await;
            }
            Ok(Bytes::from(attachment.file_id.clone()))
        }

        async fn resolve_sender(&self, _peer: &PeerRef) -> Result<Option<SenderInfo>> {
            Ok(None)
        }

        async fn resolve_chat(&self, _peer: &PeerRef) -> Result<Option<ChatInfo>> {
            Ok(None)
        }
    }

    struct Archive {
        _dir: TempDir,
        pipeline: Pipeline,
        store: Arc<SqliteStore>,
        status: Arc<ArchiveStatus>,
    }

    async fn archive(client: QuietClient, concurrency: usize) -> Archive {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("archive.db")).unwrap());
        let store = Arc::new(SqliteStore::new(db));
        let attachments = Arc::new(AttachmentStore::new(dir.path().join("media")).await.unwrap());
        let status = Arc::new(ArchiveStatus::default());
        let pipeline = Pipeline::new(
            Arc::new(client),
            attachments,
            store.clone(),
            status.clone(),
            concurrency,
        );
        Archive {
            _dir: dir,
            pipeline,
            store,
            status,
        }
    }

    fn feed_settings(addr: std::net::SocketAddr) -> FeedSettings {
        FeedSettings {
            feed_url: format!("ws://{addr}"),
            api_url: Url::parse("http://127.0.0.1:1/").unwrap(),
            token: "secret".into(),
        }
    }

    fn new_message(id: i64, media: serde_json::Value) -> String {
        serde_json::json!({
            "type": "NewMessage",
            "data": {
                "message": {
                    "id": id,
                    "date": "2026-10-01T12:00:00Z",
                    "text": "hello",
                    "media": media,
                    "sender": {"id": 7},
                    "chat": {"id": -100}
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn feed_archives_only_new_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let settings = feed_settings(listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let identify = ws.next().await.unwrap().unwrap();
            let identify: serde_json::Value =
                serde_json::from_str(identify.to_text().unwrap()).unwrap();
            assert_eq!(identify["type"], "Identify");
            assert_eq!(identify["data"]["token"], "secret");

            let frames = [
                r#"{"type": "Ready", "data": {"account_id": 1}}"#.to_string(),
                r#"{"type": "TypingStart", "data": {"chat_id": -100}}"#.to_string(),
                "not json".to_string(),
                new_message(42, serde_json::Value::Null),
            ];
            for frame in frames {
                ws.send(Message::text(frame)).await.unwrap();
            }
            ws.send(Message::Close(None)).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let archive = archive(QuietClient { stall: false }, 2).await;
        run_feed(&settings, &archive.pipeline, CancellationToken::new())
            .await
            .unwrap();
        archive.pipeline.drain().await;
        server.await.unwrap();

        assert_eq!(archive.store.count().await.unwrap(), 1);
        let counters = archive.status.ingest.snapshot();
        assert_eq!(counters.received, 1);
        assert_eq!(counters.archived, 1);
    }

    #[tokio::test]
    async fn shutdown_is_seen_while_workers_are_busy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let settings = feed_settings(listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.next().await;
            for id in [1, 2] {
                let media = serde_json::json!({"file_id": format!("p-{id}"), "kind": "photo"});
                ws.send(Message::text(new_message(id, media))).await.unwrap();
            }
            while let Some(Ok(_)) = ws.next().await {}
        });

        // One worker, stuck on the first download; the second event waits.
        let archive = archive(QuietClient { stall: true }, 1).await;
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            run_feed(&settings, &archive.pipeline, shutdown),
        )
        .await;

        assert!(matches!(stopped, Ok(Ok(()))), "feed reader did not stop: {stopped:?}");
        assert_eq!(archive.store.count().await.unwrap(), 0);
        server.abort();
    }
}
