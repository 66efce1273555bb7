//! Download facade: one registry job per worker run.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::downloader::{
    DownloadStats, DownloadWorker, DownloaderStatus, RunObserver, RunOutcome, StartOutcome, StopOutcome, WorkerState,
};
use crate::jobs::{DownloadProgress, JobId, JobKind, JobProgress, JobRegistry, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStart {
    Started(JobId),
    /// A run is active; carries its job.
    AlreadyRunning(Option<JobId>),
    /// The previous run is still winding down.
    StillStopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The run exited within the grace period.
    Stopped,
    /// The grace period ran out (or `force` was set) and the run was aborted.
    Cancelled,
    NotRunning,
}

/// Forwards worker events to one registry job.
struct JobObserver {
    registry: Arc<JobRegistry>,
    id: JobId,
    chat: String,
}

impl JobObserver {
    fn progress(&self, stats: &DownloadStats) -> JobProgress {
        JobProgress::Download(stats.to_progress(&self.chat))
    }
}

impl RunObserver for JobObserver {
    fn job_id(&self) -> Option<JobId> {
        Some(self.id)
    }

    fn on_running(&self) {
        self.registry.mark(self.id, JobStatus::Running, None, None);
    }

    fn on_progress(&self, stats: &DownloadStats) {
        self.registry.update_progress(self.id, self.progress(stats));
    }

    fn is_cancelled(&self) -> bool {
        self.registry.is_cancelled(self.id)
    }

    fn on_finish(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Completed(stats) => {
                self.registry
                    .mark(self.id, JobStatus::Completed, Some(self.progress(stats)), None)
            }
            RunOutcome::Stopped(stats) => {
                self.registry
                    .mark(self.id, JobStatus::Cancelled, Some(self.progress(stats)), None)
            }
            RunOutcome::Failed { error, stats } => self.registry.mark(
                self.id,
                JobStatus::Failed,
                Some(self.progress(stats)),
                Some(error.clone()),
            ),
            RunOutcome::Cancelled => self.registry.mark(
                self.id,
                JobStatus::Cancelled,
                None,
                Some("stopped after grace period".to_string()),
            ),
        }
    }
}

pub struct DownloadService {
    registry: Arc<JobRegistry>,
    worker: DownloadWorker,
    stop_timeout: Duration,
    current: Mutex<Option<JobId>>,
}

impl DownloadService {
    pub fn new(registry: Arc<JobRegistry>, worker: DownloadWorker, stop_timeout: Duration) -> Self {
        Self {
            registry,
            worker,
            stop_timeout,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> Option<JobId> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a worker run under a new download job.
    pub async fn start(&self) -> DownloadStart {
        let status = self.worker.status();
        if status.running {
            return DownloadStart::AlreadyRunning(status.job_id);
        }
        if status.state == WorkerState::Stopping {
            return DownloadStart::StillStopping;
        }
        let chat = self.worker.settings().chat.clone();
        let job = self.registry.create(
            JobKind::Download,
            Some(JobProgress::Download(DownloadProgress {
                chat: Some(chat.clone()),
                ..DownloadProgress::default()
            })),
        );
        let observer = Arc::new(JobObserver {
            registry: Arc::clone(&self.registry),
            id: job.id,
            chat,
        });
        self.registry.mark(job.id, JobStatus::Starting, None, None);
        let outcome = self.worker.start(observer).await;
        let not_started = match outcome {
            StartOutcome::Started => {
                *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(job.id);
                return DownloadStart::Started(job.id);
            }
            StartOutcome::AlreadyRunning => DownloadStart::AlreadyRunning(self.worker.status().job_id),
            StartOutcome::StillStopping => DownloadStart::StillStopping,
        };
        self.registry.mark(
            job.id,
            JobStatus::Failed,
            None,
            Some("download worker is busy".to_string()),
        );
        not_started
    }

    /// Stops the running worker. Waits up to `timeout` (default: the
    /// configured grace period) unless `force` is set.
    pub async fn stop(&self, force: bool, timeout: Option<Duration>) -> ShutdownOutcome {
        if self.worker.stop().await == StopOutcome::NotRunning {
            return ShutdownOutcome::NotRunning;
        }
        let grace = if force {
            Duration::ZERO
        } else {
            timeout.unwrap_or(self.stop_timeout)
        };
        if self.worker.wait_until_stopped(grace).await {
            ShutdownOutcome::Stopped
        } else {
            ShutdownOutcome::Cancelled
        }
    }

    /// Flags the job for cancellation; the current run is also asked to stop.
    pub async fn cancel(&self, id: JobId) -> bool {
        let flagged = self.registry.request_cancel(id);
        if flagged && self.current() == Some(id) {
            self.worker.stop().await;
        }
        flagged
    }

    /// Waits for the current run to end on its own. `None` waits indefinitely.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        self.worker
            .wait_until_stopped(timeout.unwrap_or(Duration::MAX))
            .await
    }

    pub fn status(&self) -> DownloaderStatus {
        self.worker.status()
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current()
    }
}
