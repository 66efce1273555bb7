//! Thread-safe job table guarded by a single coarse lock.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::progress::JobProgress;
use super::types::{Job, JobId, JobKind, JobStatus};

struct Entry {
    job: Job,
    /// Insertion order; breaks `started_at` ties in `list`.
    seq: u64,
}

#[derive(Default)]
struct Table {
    jobs: HashMap<JobId, Entry>,
    cancel_flags: HashSet<JobId>,
    next_seq: u64,
}

/// Single source of truth for job existence, status, and cancellation intent.
///
/// No operation blocks on I/O while holding the lock. Jobs are kept for the
/// lifetime of the registry.
#[derive(Default)]
pub struct JobRegistry {
    table: Mutex<Table>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a new job in `pending`. A missing or mismatched initial
    /// payload is replaced by an empty one for `kind`.
    pub fn create(&self, kind: JobKind, initial_progress: Option<JobProgress>) -> Job {
        let progress = match initial_progress {
            Some(p) if p.kind() == kind => p,
            Some(_) => {
                tracing::warn!(kind = kind.as_str(), "initial progress for another job kind ignored");
                JobProgress::empty(kind)
            }
            None => JobProgress::empty(kind),
        };
        let job = Job {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            progress,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        };
        let mut table = self.table();
        let seq = table.next_seq;
        table.next_seq += 1;
        table.jobs.insert(
            job.id,
            Entry {
                job: job.clone(),
                seq,
            },
        );
        tracing::debug!(job_id = %job.id, kind = kind.as_str(), "job created");
        job
    }

    /// Transitions a job. Unknown ids and jobs already in a terminal state are
    /// left alone. Entering a terminal state stamps `finished_at` and clears
    /// any pending cancellation flag.
    pub fn mark(
        &self,
        id: JobId,
        status: JobStatus,
        progress: Option<JobProgress>,
        error: Option<String>,
    ) {
        let mut table = self.table();
        let Table {
            jobs, cancel_flags, ..
        } = &mut *table;
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };
        let job = &mut entry.job;
        if job.status.is_terminal() {
            tracing::debug!(
                job_id = %id,
                from = job.status.as_str(),
                to = status.as_str(),
                "ignoring transition out of terminal state"
            );
            return;
        }
        job.status = status;
        if let Some(p) = progress {
            if !job.progress.merge(p) {
                tracing::warn!(job_id = %id, "progress for another job kind ignored");
            }
        }
        if status.is_terminal() {
            job.finished_at = Some(Utc::now());
            cancel_flags.remove(&id);
        }
        if error.is_some() {
            job.error = error;
        }
    }

    /// Merges progress without changing status. No-op for unknown ids.
    pub fn update_progress(&self, id: JobId, progress: JobProgress) {
        let mut table = self.table();
        if let Some(entry) = table.jobs.get_mut(&id) {
            if !entry.job.progress.merge(progress) {
                tracing::warn!(job_id = %id, "progress for another job kind ignored");
            }
        }
    }

    /// Sets the cancellation flag if the job exists and is not terminal.
    /// Returns whether the flag was newly set.
    pub fn request_cancel(&self, id: JobId) -> bool {
        let mut table = self.table();
        let active = table
            .jobs
            .get(&id)
            .map(|e| !e.job.status.is_terminal())
            .unwrap_or(false);
        if !active {
            return false;
        }
        let newly_set = table.cancel_flags.insert(id);
        if newly_set {
            tracing::info!(job_id = %id, "cancellation requested");
        }
        newly_set
    }

    pub fn is_cancelled(&self, id: JobId) -> bool {
        self.table().cancel_flags.contains(&id)
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.table().jobs.get(&id).map(|e| e.job.clone())
    }

    /// Most recent jobs first; `limit` is clamped to at least 1.
    pub fn list(&self, limit: usize) -> Vec<Job> {
        let table = self.table();
        let mut entries: Vec<&Entry> = table.jobs.values().collect();
        entries.sort_by(|a, b| {
            b.job
                .started_at
                .cmp(&a.job.started_at)
                .then(b.seq.cmp(&a.seq))
        });
        entries
            .into_iter()
            .take(limit.max(1))
            .map(|e| e.job.clone())
            .collect()
    }
}
