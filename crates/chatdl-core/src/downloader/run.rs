//! One download run: session, queue construction, per-item processing.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::shared::Shared;
use super::state::{RunObserver, RunOutcome};
use super::WorkerSettings;
use crate::jobs::JobKind;
use crate::naming::format_size;
use crate::retry::{run_with_retry, AttemptError, RetryOutcome};
use crate::source::{DownloadOutcome, MessageSource, RemoteItem, Session};
use crate::store::{DownloadStore, RecordStatus};

/// Result of processing one queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemResult {
    Downloaded,
    Failed,
    Skipped,
    /// Stop seen before or between attempts; nothing is counted.
    Interrupted,
}

pub(super) struct Run {
    pub settings: WorkerSettings,
    pub source: Arc<dyn MessageSource>,
    pub store: Arc<dyn DownloadStore>,
    pub shared: Arc<Shared>,
    pub stop: CancellationToken,
    pub observer: Arc<dyn RunObserver>,
}

impl Run {
    pub async fn execute(self) {
        let outcome = self.run().await;
        self.close_record(&outcome).await;
        self.shared.end_run();
        match &outcome {
            RunOutcome::Completed(stats) => tracing::info!(
                downloaded = stats.downloaded,
                failed = stats.failed,
                skipped = stats.skipped,
                "download run finished"
            ),
            RunOutcome::Stopped(stats) => tracing::info!(processed = stats.processed, "download run stopped"),
            RunOutcome::Failed { error, .. } => tracing::error!("download run failed: {}", error),
            RunOutcome::Cancelled => {}
        }
        self.observer.on_finish(&outcome);
    }

    fn should_stop(&self) -> bool {
        if self.stop.is_cancelled() {
            return true;
        }
        if self.observer.is_cancelled() {
            // Job-level cancel: stop this run the same way stop() would.
            self.stop.cancel();
            return true;
        }
        false
    }

    fn failed(&self, error: String) -> RunOutcome {
        RunOutcome::Failed {
            error,
            stats: self.shared.stats(),
        }
    }

    async fn run(&self) -> RunOutcome {
        let chat = self.settings.chat.clone();
        match self
            .store
            .start_job_record(JobKind::Download, &serde_json::json!({ "chat": chat }))
            .await
        {
            Ok(id) => self.shared.set_record(Some(id)),
            Err(e) => tracing::warn!("could not open download job record: {:#}", e),
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.download_dir).await {
            return self.failed(format!(
                "cannot create download dir {}: {}",
                self.settings.download_dir.display(),
                e
            ));
        }

        let session = match self.source.open_session().await {
            Ok(s) => s,
            Err(e) => return self.failed(e.to_string()),
        };
        let info = match session.resolve_chat(&chat).await {
            Ok(info) => info,
            Err(e) => return self.failed(e.to_string()),
        };
        tracing::info!(chat = %chat, id = %info.id, title = ?info.title, "chat resolved");

        if self.stop.is_cancelled() {
            return RunOutcome::Stopped(self.shared.stats());
        }
        self.shared.mark_running();
        self.observer.on_running();

        let items = match session.enumerate(&chat).await {
            Ok(items) => items,
            Err(e) => return self.failed(e.to_string()),
        };
        let mut queue = self.build_queue(items);
        self.report();

        let mut last_refresh = Instant::now();
        let mut index = 0usize;
        while let Some(item) = queue.pop_front() {
            if self.should_stop() {
                return RunOutcome::Stopped(self.shared.stats());
            }
            index += 1;
            let name = item.local_filename();
            self.shared.with_stats(|s| {
                s.current_index = index;
                s.current_file = Some(name.clone());
            });

            let result = self.process(session.as_ref(), &item, &name).await;
            if result == ItemResult::Interrupted {
                return RunOutcome::Stopped(self.shared.stats());
            }
            self.shared.with_stats(|s| {
                match result {
                    ItemResult::Downloaded => s.downloaded += 1,
                    ItemResult::Failed => s.failed += 1,
                    ItemResult::Skipped => s.skipped += 1,
                    ItemResult::Interrupted => {}
                }
                s.update_progress();
            });
            self.report();

            if self.settings.auto_refresh
                && !queue.is_empty()
                && last_refresh.elapsed() >= self.settings.refresh_interval
            {
                self.refresh(session.as_ref(), &chat, &mut queue).await;
                last_refresh = Instant::now();
            }
        }

        self.shared.with_stats(|s| {
            s.current_file = None;
            s.update_progress();
        });
        RunOutcome::Completed(self.shared.stats())
    }

    fn report(&self) {
        let stats = self.shared.stats();
        self.observer.on_progress(&stats);
    }

    /// Filters text candidates and drops those already downloaded.
    fn build_queue(&self, items: Vec<RemoteItem>) -> VecDeque<RemoteItem> {
        let candidates: Vec<RemoteItem> = items.into_iter().filter(RemoteItem::is_text_candidate).collect();
        let total_candidates = candidates.len() as u64;
        let mut queue = VecDeque::with_capacity(candidates.len());
        let mut already_present = 0u64;
        for item in candidates {
            if self.shared.is_downloaded(&item.identity()) {
                already_present += 1;
            } else {
                queue.push_back(item);
            }
        }
        let total_to_download = queue.len() as u64;
        self.shared.with_stats(|s| {
            s.total_candidates = total_candidates;
            s.already_present = already_present;
            s.total_to_download = total_to_download;
            s.update_progress();
        });
        tracing::info!(total_candidates, already_present, total_to_download, "download queue built");
        queue
    }

    /// Re-point the remaining queue at fresh references; vanished ids are dropped.
    async fn refresh(&self, session: &dyn Session, chat: &str, queue: &mut VecDeque<RemoteItem>) {
        let fresh = match session.enumerate(chat).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("refresh failed, keeping current queue: {}", e);
                return;
            }
        };
        let mut by_id: HashMap<i64, RemoteItem> = fresh
            .into_iter()
            .filter(RemoteItem::is_text_candidate)
            .map(|it| (it.id, it))
            .collect();
        let before = queue.len();
        let remaining: VecDeque<RemoteItem> = queue.drain(..).filter_map(|it| by_id.remove(&it.id)).collect();
        *queue = remaining;
        // Dropped entries count as skipped so a finished run still adds up.
        let dropped = (before - queue.len()) as u64;
        if dropped > 0 {
            self.shared.with_stats(|s| {
                s.skipped += dropped;
                s.update_progress();
            });
            self.report();
        }
        tracing::info!(before, after = queue.len(), dropped, "download queue refreshed");
    }

    async fn process(&self, session: &dyn Session, item: &RemoteItem, name: &str) -> ItemResult {
        let max_age = self.settings.max_file_age_days;
        if max_age > 0 {
            // Whole days: 7 days and a few hours is still within a 7 day limit.
            let age_days = chrono::Utc::now().signed_duration_since(item.timestamp).num_days();
            if age_days > i64::try_from(max_age).unwrap_or(i64::MAX) {
                tracing::info!(file = %name, "skipping: older than {} days", max_age);
                return ItemResult::Skipped;
            }
        }
        if item.byte_size > self.settings.max_file_size_bytes {
            tracing::info!(file = %name, size = %format_size(item.byte_size), "skipping: over size limit");
            return ItemResult::Skipped;
        }

        let dest = self.settings.download_dir.join(name);
        match tokio::fs::metadata(&dest).await {
            Ok(meta) if meta.is_file() && meta.len() == item.byte_size => {
                tracing::info!(file = %name, "already on disk with matching size");
                self.persist(item, &dest, item.byte_size).await;
                return ItemResult::Downloaded;
            }
            Ok(_) => {
                if let Err(e) = tokio::fs::remove_file(&dest).await {
                    tracing::warn!(file = %name, "could not remove stale file: {}", e);
                }
            }
            Err(_) => {}
        }

        let started = Instant::now();
        let dest_ref: &Path = &dest;
        let outcome = run_with_retry(&self.settings.retry, &self.stop, move |_attempt| {
            self.attempt(session, item, dest_ref)
        })
        .await;
        match outcome {
            RetryOutcome::Done {
                value: (path, size),
                attempts,
            } => {
                let secs = started.elapsed().as_secs_f64();
                let mbps = if secs > 0.0 {
                    size as f64 / (1024.0 * 1024.0) / secs
                } else {
                    0.0
                };
                tracing::info!(
                    file = %name,
                    size = %format_size(size),
                    attempts,
                    "downloaded in {:.1}s ({:.2} MB/s)",
                    secs,
                    mbps
                );
                self.persist(item, &path, size).await;
                ItemResult::Downloaded
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                tracing::error!(file = %name, attempts, "download failed: {}", last_error);
                ItemResult::Failed
            }
            RetryOutcome::Interrupted => ItemResult::Interrupted,
        }
    }

    async fn attempt(&self, session: &dyn Session, item: &RemoteItem, dest: &Path) -> Result<(PathBuf, u64), AttemptError> {
        match session.download(&self.settings.chat, item, dest).await {
            DownloadOutcome::Saved(path) => {
                let size = tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.len())
                    .map_err(|e| AttemptError::transient(format!("downloaded file missing: {}", e)))?;
                if size == 0 {
                    discard(&path).await;
                    return Err(AttemptError::transient("download produced an empty file"));
                }
                if item.byte_size > 0 && size != item.byte_size {
                    discard(&path).await;
                    return Err(AttemptError::transient(format!(
                        "size mismatch: expected {} bytes, got {}",
                        item.byte_size, size
                    )));
                }
                Ok((path, size))
            }
            DownloadOutcome::RateLimited(wait) => Err(AttemptError::rate_limited(wait)),
            DownloadOutcome::Retryable(msg) => Err(AttemptError::transient(msg)),
            DownloadOutcome::Fatal(msg) => Err(AttemptError::fatal(msg)),
        }
    }

    async fn persist(&self, item: &RemoteItem, path: &Path, size: u64) {
        let identity = item.identity();
        if let Err(e) = self.store.mark_downloaded(&identity, Some(path), Some(size)).await {
            tracing::warn!(identity = %identity, "could not persist download: {:#}", e);
        }
        self.shared.add_downloaded(identity);
    }

    async fn close_record(&self, outcome: &RunOutcome) {
        let Some(record_id) = self.shared.take_record() else {
            return;
        };
        let (status, details) = match outcome {
            RunOutcome::Completed(stats) => (RecordStatus::Finished, stats.summary_json()),
            RunOutcome::Stopped(stats) => (RecordStatus::Stopped, stats.summary_json()),
            RunOutcome::Cancelled => (RecordStatus::Stopped, self.shared.stats().summary_json()),
            RunOutcome::Failed { error, .. } => (RecordStatus::Failed, serde_json::json!({ "error": error })),
        };
        if let Err(e) = self.store.finish_job_record(record_id, status, &details).await {
            tracing::warn!("could not close download job record: {:#}", e);
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), "could not remove bad download: {}", e);
    }
}

/// Closes the record of a run whose task was aborted.
pub(super) async fn close_aborted(store: &dyn DownloadStore, shared: &Shared) {
    let Some(record_id) = shared.take_record() else {
        return;
    };
    let details = shared.stats().summary_json();
    if let Err(e) = store.finish_job_record(record_id, RecordStatus::Stopped, &details).await {
        tracing::warn!("could not close aborted download job record: {:#}", e);
    }
}
