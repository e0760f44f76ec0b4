//! Error taxonomy shared by the storage client, the index client and both
//! orchestrators.
//!
//! Library code returns [`SyncError`]; the CLI wraps it in `anyhow` at the
//! process boundary.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Credentials could not be loaded or exchanged for a token. Always fatal.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A list call against the object store or the index failed.
    #[error("list request failed: {0}")]
    RemoteList(String),

    /// Reading an object's bytes failed.
    #[error("download of {object} failed: {message}")]
    Download { object: String, message: String },

    /// Reserving a media upload session failed.
    #[error("upload session failed: {0}")]
    Upload(String),

    #[error("index read failed: {0}")]
    IndexRead(String),

    #[error("index write failed: {0}")]
    IndexWrite(String),

    /// Stale version token, unknown item, or transport failure on delete.
    #[error("index delete failed: {0}")]
    IndexDelete(String),

    /// A document value could not be represented as JSON text.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn download(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            object: object.into(),
            message: message.into(),
        }
    }
}
