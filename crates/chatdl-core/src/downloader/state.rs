//! Worker state machine and the values exchanged with callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stats::DownloadStats;
use crate::jobs::JobId;

/// `stopped → starting → running → stopping → stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Stopped => "stopped",
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
        }
    }

    /// Starting or running. This alone decides `running` for observers.
    pub fn is_active(self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// A stop was requested but the previous run has not exited yet.
    StillStopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopping,
    NotRunning,
}

/// How a run ended, reported once through [`RunObserver::on_finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Queue exhausted.
    Completed(DownloadStats),
    /// Stop signal or job cancellation seen; the current item finished first.
    Stopped(DownloadStats),
    /// Session or chat resolution failed; no items were processed.
    Failed { error: String, stats: DownloadStats },
    /// Grace period ran out and the run task was aborted.
    Cancelled,
}

/// Read-only view of the worker.
#[derive(Debug, Clone, Serialize)]
pub struct DownloaderStatus {
    pub stats: DownloadStats,
    pub state: WorkerState,
    pub last_state_change: DateTime<Utc>,
    pub running: bool,
    pub job_id: Option<JobId>,
    /// Identities known to be downloaded, across all runs.
    pub overall_downloaded: usize,
}

/// Hooks a caller attaches to one run. Called from the run task.
pub trait RunObserver: Send + Sync {
    /// Registry job this run reports to, if any.
    fn job_id(&self) -> Option<JobId> {
        None
    }

    /// Session open and chat resolved.
    fn on_running(&self) {}

    fn on_progress(&self, _stats: &DownloadStats) {}

    /// Polled at item boundaries; true ends the run like `stop()`.
    fn is_cancelled(&self) -> bool {
        false
    }

    fn on_finish(&self, _outcome: &RunOutcome) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
