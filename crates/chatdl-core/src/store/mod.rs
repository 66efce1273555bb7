//! Persistent download/job store (SQLite via sqlx).
//!
//! Keeps the identities of files already mirrored (so reruns skip them),
//! recorded search result files, and one record per download/search run.

pub mod types;
pub mod db;
mod files;
mod records;

pub use db::SqliteStore;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

use crate::jobs::JobKind;

/// What the download worker and the facades need from persistence.
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Identities of every remote item already downloaded.
    async fn downloaded_identities(&self) -> Result<HashSet<String>>;

    /// Mark `identity` as downloaded. Absent path/size keep the stored values.
    async fn mark_downloaded(&self, identity: &str, path: Option<&Path>, size_bytes: Option<u64>) -> Result<()>;

    /// Open a job record with status `running`; returns its row id.
    async fn start_job_record(&self, kind: JobKind, details: &serde_json::Value) -> Result<i64>;

    async fn finish_job_record(&self, record_id: i64, status: RecordStatus, details: &serde_json::Value) -> Result<()>;

    /// Register a search result file (identity `search:<file name>`).
    async fn record_search_result(&self, path: &Path, size_bytes: u64) -> Result<()>;
}

#[async_trait]
impl DownloadStore for SqliteStore {
    async fn downloaded_identities(&self) -> Result<HashSet<String>> {
        self.load_downloaded().await
    }

    async fn mark_downloaded(&self, identity: &str, path: Option<&Path>, size_bytes: Option<u64>) -> Result<()> {
        self.upsert_file(identity, path, size_bytes, FileOrigin::Remote).await
    }

    async fn start_job_record(&self, kind: JobKind, details: &serde_json::Value) -> Result<i64> {
        self.insert_record(kind.as_str(), details).await
    }

    async fn finish_job_record(&self, record_id: i64, status: RecordStatus, details: &serde_json::Value) -> Result<()> {
        self.close_record(record_id, status, details).await
    }

    async fn record_search_result(&self, path: &Path, size_bytes: u64) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        self.upsert_file(&format!("search:{}", name), Some(path), Some(size_bytes), FileOrigin::Search)
            .await
    }
}
