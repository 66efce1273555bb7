//! Download worker: mirrors new text attachments from the remote chat.
//!
//! A worker owns at most one run at a time. The run task opens a session,
//! builds the queue (text candidates minus identities already downloaded),
//! and processes it sequentially with bounded retries. `stop()` is
//! cooperative: the current item finishes, every wait observes the stop
//! token, and `wait_until_stopped` aborts the task once its grace period
//! runs out.

mod run;
mod shared;
mod state;
mod stats;

pub use state::{
    DownloaderStatus, NoopObserver, RunObserver, RunOutcome, StartOutcome, StopOutcome, WorkerState,
};
pub use stats::{percent_of, DownloadStats};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ChatdlConfig;
use crate::retry::RetryPolicy;
use crate::source::MessageSource;
use crate::store::DownloadStore;
use run::Run;
use shared::Shared;

/// Per-worker limits, taken from `[source]`, `[download]` and `[retry]`.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub chat: String,
    pub download_dir: PathBuf,
    pub max_file_size_bytes: u64,
    /// 0 = no age limit.
    pub max_file_age_days: u64,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub retry: RetryPolicy,
}

impl WorkerSettings {
    pub fn from_config(cfg: &ChatdlConfig) -> Self {
        Self {
            chat: cfg.source.chat.clone(),
            download_dir: cfg.download.download_dir.clone(),
            max_file_size_bytes: cfg.download.max_file_size_bytes(),
            max_file_age_days: cfg.download.max_file_age_days,
            auto_refresh: cfg.download.auto_refresh,
            refresh_interval: cfg.download.refresh_interval(),
            retry: RetryPolicy::from(&cfg.retry),
        }
    }
}

struct RunHandle {
    task: JoinHandle<()>,
    observer: Arc<dyn RunObserver>,
}

pub struct DownloadWorker {
    settings: WorkerSettings,
    source: Arc<dyn MessageSource>,
    store: Arc<dyn DownloadStore>,
    shared: Arc<Shared>,
    /// Start/stop critical section; holds the live run, if any.
    control: Mutex<Option<RunHandle>>,
}

impl DownloadWorker {
    /// Creates an idle worker, loading known identities from the store.
    /// A store failure leaves the set empty.
    pub async fn new(settings: WorkerSettings, source: Arc<dyn MessageSource>, store: Arc<dyn DownloadStore>) -> Self {
        let downloaded = match store.downloaded_identities().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("could not load downloaded identities: {:#}", e);
                Default::default()
            }
        };
        tracing::debug!(known = downloaded.len(), "download worker ready");
        Self {
            settings,
            source,
            store,
            shared: Arc::new(Shared::new(downloaded)),
            control: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Starts a run unless one is active. Never opens a second session.
    pub async fn start(&self, observer: Arc<dyn RunObserver>) -> StartOutcome {
        let mut control = self.control.lock().await;
        if let Some(handle) = control.as_ref() {
            if !handle.task.is_finished() {
                let (state, _, _) = self.shared.state();
                return if state == WorkerState::Stopping {
                    StartOutcome::StillStopping
                } else {
                    StartOutcome::AlreadyRunning
                };
            }
        }

        let stop = CancellationToken::new();
        self.shared.begin_run(observer.job_id(), stop.clone());
        let run = Run {
            settings: self.settings.clone(),
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            shared: Arc::clone(&self.shared),
            stop,
            observer: Arc::clone(&observer),
        };
        let task = tokio::spawn(run.execute());
        *control = Some(RunHandle { task, observer });
        tracing::info!(chat = %self.settings.chat, "download run started");
        StartOutcome::Started
    }

    /// Requests a cooperative stop. Observers see the worker as not running
    /// from here on; the run task exits at its next boundary.
    pub async fn stop(&self) -> StopOutcome {
        if self.shared.request_stop() {
            tracing::info!("download worker stop requested");
            StopOutcome::Stopping
        } else {
            StopOutcome::NotRunning
        }
    }

    /// Waits for the run task to exit. After `timeout` the task is aborted;
    /// returns false in that case (non-graceful shutdown).
    pub async fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let mut control = self.control.lock().await;
        let Some(RunHandle { mut task, observer }) = control.take() else {
            return true;
        };
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("download run task ended abnormally: {}", e);
                self.finish_aborted(observer.as_ref()).await;
                false
            }
            Err(_) => {
                tracing::warn!("download worker did not stop within {}s, cancelling", timeout.as_secs_f64());
                task.abort();
                let _ = task.await;
                self.finish_aborted(observer.as_ref()).await;
                false
            }
        }
    }

    async fn finish_aborted(&self, observer: &dyn RunObserver) {
        run::close_aborted(self.store.as_ref(), &self.shared).await;
        self.shared.end_run();
        observer.on_finish(&RunOutcome::Cancelled);
    }

    pub fn status(&self) -> DownloaderStatus {
        let (state, last_state_change, job_id) = self.shared.state();
        let running = state.is_active();
        if let Ok(control) = self.control.try_lock() {
            let alive = control.as_ref().map(|h| !h.task.is_finished()).unwrap_or(false);
            if running && !alive {
                tracing::warn!(state = state.as_str(), "worker state says active but no run task is alive");
            }
        }
        DownloaderStatus {
            stats: self.shared.stats(),
            state,
            last_state_change,
            running,
            job_id,
            overall_downloaded: self.shared.downloaded_count(),
        }
    }
}
