//! Orchestration facade: binds the search engine and the download worker to
//! the job registry.
//!
//! Services are built once at process start ([`Services::new`]) and shared
//! by handle; there is no global state.

mod download;
mod search;

pub use download::{DownloadService, DownloadStart, ShutdownOutcome};
pub use search::{SearchOptions, SearchService, SearchSettings, SearchState, SearchStatus};

use std::sync::Arc;

use crate::config::ChatdlConfig;
use crate::downloader::{DownloadWorker, WorkerSettings};
use crate::jobs::{JobId, JobKind, JobRegistry};
use crate::source::MessageSource;
use crate::store::DownloadStore;

/// Every service of one process.
pub struct Services {
    pub registry: Arc<JobRegistry>,
    pub store: Arc<dyn DownloadStore>,
    pub search: Arc<SearchService>,
    pub download: DownloadService,
}

impl Services {
    pub async fn new(config: &ChatdlConfig, source: Arc<dyn MessageSource>, store: Arc<dyn DownloadStore>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let worker = DownloadWorker::new(WorkerSettings::from_config(config), source, Arc::clone(&store)).await;
        let download = DownloadService::new(Arc::clone(&registry), worker, config.download.stop_timeout());
        let search = Arc::new(SearchService::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            SearchSettings::from_config(config),
        ));
        Self {
            registry,
            store,
            search,
            download,
        }
    }

    /// Requests cancellation of any job. Download jobs also get a worker stop.
    pub async fn cancel(&self, id: JobId) -> bool {
        match self.registry.get(id).map(|job| job.kind) {
            Some(JobKind::Download) => self.download.cancel(id).await,
            Some(JobKind::Search) => self.registry.request_cancel(id),
            None => false,
        }
    }
}
