//! Remote message source: the chat whose file attachments are mirrored.
//!
//! The worker only sees the object-safe [`MessageSource`]/[`Session`] pair.
//! Download results come back as a tagged [`DownloadOutcome`] so the retry
//! loop can switch on the tag.

pub mod http;
mod item;

pub use http::HttpSource;
pub use item::{ChatInfo, RemoteItem};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Result of a single download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Content written to this path.
    Saved(PathBuf),
    /// The source requires waiting exactly this long before retrying.
    RateLimited(Duration),
    /// Remote or transport failure worth retrying.
    Retryable(String),
    /// The item cannot be fetched (e.g. it was deleted).
    Fatal(String),
}

/// Errors from session setup and enumeration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Factory for sessions against the remote source.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn open_session(&self) -> Result<Arc<dyn Session>, SourceError>;
}

/// An open session. Dropped when the run ends.
#[async_trait]
pub trait Session: Send + Sync {
    /// Confirms the target chat is reachable.
    async fn resolve_chat(&self, chat: &str) -> Result<ChatInfo, SourceError>;

    /// Every item in the chat, oldest first as the source reports them.
    async fn enumerate(&self, chat: &str) -> Result<Vec<RemoteItem>, SourceError>;

    /// Fetches one item's content into `dest`.
    async fn download(&self, chat: &str, item: &RemoteItem, dest: &Path) -> DownloadOutcome;
}
