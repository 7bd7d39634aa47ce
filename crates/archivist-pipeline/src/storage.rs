use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use archivist_types::events::{AttachmentKind, AttachmentRef};

use crate::client::MessagingClient;
use crate::error::AttachmentError;

/// Declared MIME types with a known file extension.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/webp", ".webp"),
    ("image/gif", ".gif"),
    ("video/mp4", ".mp4"),
    ("video/x-matroska", ".mkv"),
    ("audio/mpeg", ".mp3"),
    ("audio/ogg", ".ogg"),
    ("audio/wav", ".wav"),
    ("application/pdf", ".pdf"),
    ("application/zip", ".zip"),
    ("application/x-rar-compressed", ".rar"),
    ("text/plain", ".txt"),
];

/// Manages the on-disk media directory.
///
/// Each attachment is stored as a single flat file at
/// `{media_dir}/{epoch_millis}_{message_id}{ext}`. Files are written once
/// by the pipeline and deleted once by the retention sweep.
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for an attachment saved at `saved_at_ms`.
    pub fn file_path(&self, saved_at_ms: i64, message_id: i64, ext: &str) -> PathBuf {
        self.dir.join(format!("{saved_at_ms}_{message_id}{ext}"))
    }

    /// Download an attachment through the client and write it to disk.
    /// The returned path is only handed out once the data is synced.
    pub async fn save(
        &self,
        client: &dyn MessagingClient,
        message_id: i64,
        attachment: &AttachmentRef,
    ) -> Result<PathBuf, AttachmentError> {
        let data = client
            .download_attachment(attachment)
            .await
            .map_err(AttachmentError::Download)?;

        self.write(message_id, attachment, &data).await
    }

    /// Write an already downloaded payload.
    pub async fn write(
        &self,
        message_id: i64,
        attachment: &AttachmentRef,
        data: &[u8],
    ) -> Result<PathBuf, AttachmentError> {
        let ext = extension_for(attachment);
        let path = self.file_path(Utc::now().timestamp_millis(), message_id, &ext);

        write_new_file(&path, data)
            .await
            .map_err(|source| AttachmentError::Write {
                path: path.clone(),
                source,
            })?;

        debug!("Saved {} bytes to {}", data.len(), path.display());
        Ok(path)
    }

    /// Delete an attachment file. Returns `Ok(false)` if it was already gone.
    pub async fn remove(path: &Path) -> std::io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Deleted media file {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// Refuses to overwrite: a same-millisecond collision for one message
// becomes a write error instead of clobbering another record's file.
async fn write_new_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let written = async {
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;

    if written.is_err() {
        // Don't leave a truncated file behind for a record that won't point at it.
        let _ = fs::remove_file(path).await;
    }
    written
}

/// Resolve the file extension (with leading dot) for an attachment.
///
/// Declared MIME first, then `.jpg` for photos without one, then the
/// extension of the attached filename, else none.
pub fn extension_for(attachment: &AttachmentRef) -> String {
    let ext = match attachment.mime_type.as_deref() {
        Some(mime) => extension_from_mime(mime),
        None if attachment.kind == AttachmentKind::Photo => Some(".jpg"),
        None => None,
    };

    if let Some(ext) = ext {
        return ext.to_string();
    }

    attachment
        .file_name()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn extension_from_mime(mime: &str) -> Option<&'static str> {
    MIME_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == mime)
        .map(|(_, ext)| *ext)
}
