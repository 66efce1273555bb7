//! Search facade: one registry job per search run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

use crate::config::ChatdlConfig;
use crate::jobs::{JobId, JobKind, JobProgress, JobRegistry, JobStatus, SearchProgress};
use crate::search::{clamp_workers, run_search, ScanProgress, SearchError, SearchHooks, SearchRequest, SearchResult};
use crate::store::{DownloadStore, RecordStatus};

/// Defaults for searches started through the service.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Default root: the download directory.
    pub root: PathBuf,
    pub results_dir: PathBuf,
    pub max_workers: Option<usize>,
}

impl SearchSettings {
    pub fn from_config(cfg: &ChatdlConfig) -> Self {
        Self {
            root: cfg.download.download_dir.clone(),
            results_dir: cfg.search.results_dir.clone(),
            max_workers: cfg.search.max_workers,
        }
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub keyword: String,
    pub root: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    Stopped,
    Starting,
    Running,
    /// Scan finished; results and the job record are being written.
    Stopping,
}

impl SearchState {
    fn index(self) -> Option<usize> {
        match self {
            SearchState::Stopped => None,
            SearchState::Starting => Some(0),
            SearchState::Running => Some(1),
            SearchState::Stopping => Some(2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchStatus {
    pub state: SearchState,
    pub running: bool,
    pub last_state_change: DateTime<Utc>,
}

/// Number of searches in each live phase: starting, running, stopping.
struct Activity {
    phases: [usize; 3],
    last_change: DateTime<Utc>,
}

impl Activity {
    fn state(&self) -> SearchState {
        match self.phases {
            [_, r, _] if r > 0 => SearchState::Running,
            [s, _, _] if s > 0 => SearchState::Starting,
            [_, _, t] if t > 0 => SearchState::Stopping,
            _ => SearchState::Stopped,
        }
    }
}

pub struct SearchService {
    registry: Arc<JobRegistry>,
    store: Arc<dyn DownloadStore>,
    settings: SearchSettings,
    activity: Mutex<Activity>,
}

fn search_progress(p: &ScanProgress) -> JobProgress {
    JobProgress::Search(SearchProgress {
        total_files: Some(p.total_files),
        files_scanned: Some(p.files_scanned),
        matches_found: Some(p.matches_found),
        percent_complete: Some(p.percent_complete),
        current_file: Some(p.current_file.clone()),
        ..SearchProgress::default()
    })
}

fn result_progress(r: &SearchResult) -> JobProgress {
    JobProgress::Search(SearchProgress {
        scanned_files: Some(r.scanned_files),
        lines_found: Some(r.lines_found),
        output_path: Some(r.output_path.clone()),
        ..SearchProgress::default()
    })
}

impl SearchService {
    pub fn new(registry: Arc<JobRegistry>, store: Arc<dyn DownloadStore>, settings: SearchSettings) -> Self {
        Self {
            registry,
            store,
            settings,
            activity: Mutex::new(Activity {
                phases: [0; 3],
                last_change: Utc::now(),
            }),
        }
    }

    pub fn status(&self) -> SearchStatus {
        let activity = self.activity.lock().unwrap_or_else(PoisonError::into_inner);
        let state = activity.state();
        SearchStatus {
            state,
            running: matches!(state, SearchState::Starting | SearchState::Running),
            last_state_change: activity.last_change,
        }
    }

    /// Moves one search from phase `from` to phase `to`.
    fn transition(&self, from: SearchState, to: SearchState) {
        let mut activity = self.activity.lock().unwrap_or_else(PoisonError::into_inner);
        let before = activity.state();
        if let Some(i) = from.index() {
            activity.phases[i] = activity.phases[i].saturating_sub(1);
        }
        if let Some(i) = to.index() {
            activity.phases[i] += 1;
        }
        if activity.state() != before {
            activity.last_change = Utc::now();
        }
    }

    /// Creates the registry job for a search without running it.
    pub fn submit(&self, opts: &SearchOptions) -> JobId {
        let job = self.registry.create(
            JobKind::Search,
            Some(JobProgress::Search(SearchProgress {
                keyword: Some(opts.keyword.clone()),
                ..SearchProgress::default()
            })),
        );
        job.id
    }

    /// Creates a job and runs the search on the runtime. Cancel through the
    /// registry with the returned id.
    pub fn spawn(self: &Arc<Self>, opts: SearchOptions) -> (JobId, JoinHandle<Result<SearchResult, SearchError>>) {
        let id = self.submit(&opts);
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.execute(id, opts).await });
        (id, task)
    }

    /// Runs a submitted search job to its terminal state.
    pub async fn execute(&self, id: JobId, opts: SearchOptions) -> Result<SearchResult, SearchError> {
        self.registry.mark(id, JobStatus::Starting, None, None);
        self.transition(SearchState::Stopped, SearchState::Starting);
        let record = match self
            .store
            .start_job_record(JobKind::Search, &serde_json::json!({ "keyword": opts.keyword }))
            .await
        {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(job_id = %id, "could not open search job record: {:#}", e);
                None
            }
        };

        let request = SearchRequest {
            keyword: opts.keyword.clone(),
            root: opts.root.clone().unwrap_or_else(|| self.settings.root.clone()),
            output_path: opts.output_path.clone(),
            results_dir: self.settings.results_dir.clone(),
            max_workers: opts.max_workers.or(self.settings.max_workers).map(clamp_workers),
        };
        let progress_registry = Arc::clone(&self.registry);
        let cancel_registry = Arc::clone(&self.registry);
        let hooks = SearchHooks {
            on_progress: Some(Box::new(move |p: &ScanProgress| {
                progress_registry.update_progress(id, search_progress(p))
            })),
            is_cancelled: Some(Box::new(move || cancel_registry.is_cancelled(id))),
        };

        self.registry.mark(id, JobStatus::Running, None, None);
        self.transition(SearchState::Starting, SearchState::Running);
        let joined = tokio::task::spawn_blocking(move || run_search(&request, &hooks)).await;
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(SearchError::WorkerSpawn(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("search task failed: {}", e),
            ))),
        };
        self.transition(SearchState::Running, SearchState::Stopping);

        let record_status = match &result {
            Ok(r) => {
                let status = if self.registry.is_cancelled(id) {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                self.registry.mark(id, status, Some(result_progress(r)), None);
                let size = tokio::fs::metadata(&r.output_path).await.map(|m| m.len()).unwrap_or(0);
                if let Err(e) = self.store.record_search_result(&r.output_path, size).await {
                    tracing::warn!(job_id = %id, "could not record search result: {:#}", e);
                }
                tracing::info!(
                    job_id = %id,
                    scanned_files = r.scanned_files,
                    lines_found = r.lines_found,
                    output = %r.output_path.display(),
                    "search {}",
                    status.as_str()
                );
                if status == JobStatus::Cancelled {
                    RecordStatus::Stopped
                } else {
                    RecordStatus::Finished
                }
            }
            Err(e) => {
                tracing::error!(job_id = %id, "search failed: {}", e);
                self.registry.mark(id, JobStatus::Failed, None, Some(e.to_string()));
                RecordStatus::Failed
            }
        };
        if let Some(record) = record {
            let details = match &result {
                Ok(r) => serde_json::json!({
                    "keyword": opts.keyword,
                    "scanned_files": r.scanned_files,
                    "lines_found": r.lines_found,
                    "output_path": r.output_path,
                }),
                Err(e) => serde_json::json!({ "keyword": opts.keyword, "error": e.to_string() }),
            };
            if let Err(e) = self.store.finish_job_record(record, record_status, &details).await {
                tracing::warn!(job_id = %id, "could not close search job record: {:#}", e);
            }
        }
        self.transition(SearchState::Stopping, SearchState::Stopped);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busiest_phase_wins() {
        let mut activity = Activity {
            phases: [0; 3],
            last_change: Utc::now(),
        };
        assert_eq!(activity.state(), SearchState::Stopped);
        activity.phases = [1, 0, 1];
        assert_eq!(activity.state(), SearchState::Starting);
        activity.phases = [1, 1, 0];
        assert_eq!(activity.state(), SearchState::Running);
        activity.phases = [0, 0, 2];
        assert_eq!(activity.state(), SearchState::Stopping);
    }
}
