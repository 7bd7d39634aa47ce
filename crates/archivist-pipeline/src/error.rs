use std::path::PathBuf;

use thiserror::Error;

/// Failure to persist a message attachment. Never fatal for the message
/// itself: the pipeline archives it without a media path.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("download failed: {0:#}")]
    Download(anyhow::Error),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
