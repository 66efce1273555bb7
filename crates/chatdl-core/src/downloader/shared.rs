//! State shared between the worker handle and its run task.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use super::state::WorkerState;
use super::stats::DownloadStats;
use crate::jobs::JobId;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct StateCell {
    state: WorkerState,
    changed_at: DateTime<Utc>,
    job_id: Option<JobId>,
    stop: Option<CancellationToken>,
}

/// Guards are never held across an await.
pub(super) struct Shared {
    state: Mutex<StateCell>,
    stats: Mutex<DownloadStats>,
    downloaded: Mutex<HashSet<String>>,
    record_id: Mutex<Option<i64>>,
}

impl Shared {
    pub(super) fn new(downloaded: HashSet<String>) -> Self {
        Self {
            state: Mutex::new(StateCell {
                state: WorkerState::Stopped,
                changed_at: Utc::now(),
                job_id: None,
                stop: None,
            }),
            stats: Mutex::new(DownloadStats::default()),
            downloaded: Mutex::new(downloaded),
            record_id: Mutex::new(None),
        }
    }

    pub(super) fn state(&self) -> (WorkerState, DateTime<Utc>, Option<JobId>) {
        let cell = lock(&self.state);
        (cell.state, cell.changed_at, cell.job_id)
    }

    pub(super) fn set_state(&self, state: WorkerState) {
        let mut cell = lock(&self.state);
        if cell.state != state {
            tracing::debug!(from = cell.state.as_str(), to = state.as_str(), "worker state");
            cell.state = state;
            cell.changed_at = Utc::now();
        }
    }

    /// `starting → running`; a stop requested meanwhile wins.
    pub(super) fn mark_running(&self) {
        let mut cell = lock(&self.state);
        if cell.state == WorkerState::Starting {
            tracing::debug!(from = "starting", to = "running", "worker state");
            cell.state = WorkerState::Running;
            cell.changed_at = Utc::now();
        }
    }

    /// Moves an active run to `stopping` and fires its stop token. Returns
    /// false when no run is active or stopping.
    pub(super) fn request_stop(&self) -> bool {
        let mut cell = lock(&self.state);
        match cell.state {
            WorkerState::Stopped => false,
            WorkerState::Stopping => true,
            WorkerState::Starting | WorkerState::Running => {
                if let Some(stop) = &cell.stop {
                    stop.cancel();
                }
                tracing::debug!(from = cell.state.as_str(), to = "stopping", "worker state");
                cell.state = WorkerState::Stopping;
                cell.changed_at = Utc::now();
                true
            }
        }
    }

    /// Fresh stats and job binding for a new run.
    pub(super) fn begin_run(&self, job_id: Option<JobId>, stop: CancellationToken) {
        *lock(&self.stats) = DownloadStats {
            in_progress: true,
            last_update: Some(Utc::now()),
            ..DownloadStats::default()
        };
        *lock(&self.record_id) = None;
        let mut cell = lock(&self.state);
        cell.job_id = job_id;
        cell.stop = Some(stop);
        cell.state = WorkerState::Starting;
        cell.changed_at = Utc::now();
    }

    pub(super) fn end_run(&self) {
        lock(&self.stats).in_progress = false;
        self.set_state(WorkerState::Stopped);
    }

    pub(super) fn with_stats<R>(&self, f: impl FnOnce(&mut DownloadStats) -> R) -> R {
        f(&mut lock(&self.stats))
    }

    pub(super) fn stats(&self) -> DownloadStats {
        lock(&self.stats).clone()
    }

    pub(super) fn is_downloaded(&self, identity: &str) -> bool {
        lock(&self.downloaded).contains(identity)
    }

    pub(super) fn add_downloaded(&self, identity: String) {
        lock(&self.downloaded).insert(identity);
    }

    pub(super) fn downloaded_count(&self) -> usize {
        lock(&self.downloaded).len()
    }

    pub(super) fn set_record(&self, record_id: Option<i64>) {
        *lock(&self.record_id) = record_id;
    }

    pub(super) fn take_record(&self) -> Option<i64> {
        lock(&self.record_id).take()
    }
}
