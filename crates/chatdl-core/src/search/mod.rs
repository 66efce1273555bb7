//! Keyword search over the downloaded corpus.
//!
//! Enumerates every `.txt` file under a root, scans them on a bounded pool of
//! worker threads, and appends matching lines to a single output file.
//! Per-file I/O errors only drop that file's contribution; only input
//! validation and output-file creation fail the whole run.

mod engine;
mod output;
mod scan;
mod walk;

pub use engine::{clamp_workers, default_worker_count, run_search};
pub use output::resolve_output_path;
pub use walk::{is_text_file, text_files};

use std::path::PathBuf;

/// Upper bound for caller-supplied worker counts.
pub const MAX_WORKERS: usize = 128;

/// Parameters of one search run.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    /// Directory tree to scan.
    pub root: PathBuf,
    /// Explicit output file; when `None` one is synthesized under `results_dir`.
    pub output_path: Option<PathBuf>,
    pub results_dir: PathBuf,
    pub max_workers: Option<usize>,
}

/// Aggregate counters reported after each scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub total_files: usize,
    pub files_scanned: usize,
    pub matches_found: u64,
    pub percent_complete: u8,
    pub current_file: String,
}

/// Outcome of a search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Files consumed before any cancellation.
    pub scanned_files: usize,
    pub lines_found: u64,
    /// Absolute path of the match file.
    pub output_path: PathBuf,
}

/// Callbacks supplied by the caller (typically wired to the job registry).
#[derive(Default)]
pub struct SearchHooks {
    pub on_progress: Option<Box<dyn Fn(&ScanProgress) + Send + Sync>>,
    pub is_cancelled: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl SearchHooks {
    fn progress(&self, p: &ScanProgress) {
        if let Some(f) = &self.on_progress {
            f(p);
        }
    }

    fn cancelled(&self) -> bool {
        self.is_cancelled.as_ref().map(|f| f()).unwrap_or(false)
    }
}

/// Errors fatal to a whole search run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("keyword cannot be empty")]
    EmptyKeyword,
    #[error("cannot open output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not start search workers: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

#[cfg(test)]
mod tests;
