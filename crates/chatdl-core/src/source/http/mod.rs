//! HTTP chat-history source backed by libcurl.
//!
//! Endpoints under `base_url`:
//! - `GET /health` when a session opens
//! - `GET /chats/{chat}` to resolve the chat
//! - `GET /chats/{chat}/messages` for the JSON item list
//! - `GET /chats/{chat}/messages/{id}/content` for one attachment

pub mod classify;
mod client;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{ChatInfo, DownloadOutcome, MessageSource, RemoteItem, Session, SourceError};
use crate::config::SourceConfig;
use classify::{classify_http_status, StatusClass, DEFAULT_RATE_LIMIT_WAIT};
use client::{ClientSettings, Response, TransferError};

/// Message source speaking the history HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    settings: ClientSettings,
}

impl HttpSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self, SourceError> {
        let base = Url::parse(cfg.base_url.trim())
            .map_err(|e| SourceError::Connection(format!("invalid base URL {}: {}", cfg.base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::Connection(format!("invalid base URL {}", cfg.base_url)));
        }
        Ok(Self {
            base,
            settings: ClientSettings {
                token: cfg.token.clone().filter(|t| !t.trim().is_empty()),
                connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
                request_timeout: Duration::from_secs(cfg.request_timeout_secs.max(1)),
            },
        })
    }
}

#[async_trait]
impl MessageSource for HttpSource {
    async fn open_session(&self) -> Result<Arc<dyn Session>, SourceError> {
        let session = HttpSession {
            base: self.base.clone(),
            settings: self.settings.clone(),
        };
        let url = session.endpoint(&["health"]);
        let resp = session.fetch(url).await?;
        if classify_http_status(resp.code) != StatusClass::Success {
            return Err(SourceError::Connection(format!("health check returned HTTP {}", resp.code)));
        }
        tracing::debug!(base = %self.base, "history session opened");
        Ok(Arc::new(session))
    }
}

struct HttpSession {
    base: Url,
    settings: ClientSettings,
}

#[derive(Debug, Deserialize)]
struct WireChat {
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    id: i64,
    /// Unix seconds.
    timestamp: i64,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    file_size: u64,
}

impl WireItem {
    fn into_item(self) -> Result<RemoteItem, SourceError> {
        let timestamp: DateTime<Utc> = Utc
            .timestamp_opt(self.timestamp, 0)
            .single()
            .ok_or_else(|| SourceError::Decode(format!("message {}: bad timestamp {}", self.id, self.timestamp)))?;
        Ok(RemoteItem {
            id: self.id,
            timestamp,
            content_type: self.mime_type,
            byte_size: self.file_size,
            display_name: self.file_name.filter(|n| !n.trim().is_empty()),
        })
    }
}

impl HttpSession {
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in HttpSource::new.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch(&self, url: Url) -> Result<Response, SourceError> {
        let settings = self.settings.clone();
        let target = url.to_string();
        tokio::task::spawn_blocking(move || client::get(&target, &settings))
            .await
            .map_err(|e| SourceError::Connection(format!("request task failed: {}", e)))?
            .map_err(|e| SourceError::Connection(format!("{}: {}", url, e)))
    }

    fn check(resp: &Response, what: &str) -> Result<(), SourceError> {
        match classify_http_status(resp.code) {
            StatusClass::Success => Ok(()),
            StatusClass::NotFound => Err(SourceError::ChatNotFound(what.to_string())),
            _ => Err(SourceError::Remote(format!("{}: HTTP {}", what, resp.code))),
        }
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn resolve_chat(&self, chat: &str) -> Result<ChatInfo, SourceError> {
        let resp = self.fetch(self.endpoint(&["chats", chat])).await?;
        Self::check(&resp, chat)?;
        let wire: WireChat =
            serde_json::from_slice(&resp.body).map_err(|e| SourceError::Decode(format!("chat {}: {}", chat, e)))?;
        let id = match wire.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(ChatInfo { id, title: wire.title })
    }

    async fn enumerate(&self, chat: &str) -> Result<Vec<RemoteItem>, SourceError> {
        let resp = self.fetch(self.endpoint(&["chats", chat, "messages"])).await?;
        Self::check(&resp, chat)?;
        let wire: Vec<WireItem> = serde_json::from_slice(&resp.body)
            .map_err(|e| SourceError::Decode(format!("messages of {}: {}", chat, e)))?;
        wire.into_iter().map(WireItem::into_item).collect()
    }

    async fn download(&self, chat: &str, item: &RemoteItem, dest: &Path) -> DownloadOutcome {
        let id = item.id.to_string();
        let url = self.endpoint(&["chats", chat, "messages", id.as_str(), "content"]);
        let settings = self.settings.clone();
        let target = url.to_string();
        let path: PathBuf = dest.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || client::get_to_file(&target, &path, &settings)).await;
        let resp = match joined {
            Ok(Ok(resp)) => resp,
            Ok(Err(TransferError::Io(e))) => return DownloadOutcome::Fatal(format!("writing {}: {}", dest.display(), e)),
            Ok(Err(e)) => return DownloadOutcome::Retryable(e.to_string()),
            Err(e) => return DownloadOutcome::Retryable(format!("download task failed: {}", e)),
        };
        match classify_http_status(resp.code) {
            StatusClass::Success => DownloadOutcome::Saved(dest.to_path_buf()),
            StatusClass::RateLimited => DownloadOutcome::RateLimited(resp.retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT)),
            StatusClass::Retryable => DownloadOutcome::Retryable(format!("HTTP {}", resp.code)),
            StatusClass::NotFound | StatusClass::Fatal => DownloadOutcome::Fatal(format!("HTTP {}", resp.code)),
        }
    }
}
