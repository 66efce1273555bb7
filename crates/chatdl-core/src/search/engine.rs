//! Bounded worker pool driving the per-file scans.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::output::resolve_output_path;
use super::scan::scan_file;
use super::walk::text_files;
use super::{ScanProgress, SearchError, SearchHooks, SearchRequest, SearchResult, MAX_WORKERS};

/// How often the consumer re-checks cancellation while waiting on workers.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// `min(32, 4 × available parallelism)`.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    cpus.saturating_mul(4).min(32)
}

/// Clamps a caller-supplied worker count to `[1, MAX_WORKERS]`.
pub fn clamp_workers(requested: usize) -> usize {
    requested.clamp(1, MAX_WORKERS)
}

struct FileScan {
    path: PathBuf,
    matches: u64,
}

fn percent(scanned: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((100 * scanned) / total).min(100) as u8
}

fn display_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Runs one search to completion or cancellation.
///
/// Blocking: call from `spawn_blocking` when used from async code. On
/// cancellation, workers still busy finish their current file in the
/// background but are not awaited, and their matches are not counted.
pub fn run_search(req: &SearchRequest, hooks: &SearchHooks) -> Result<SearchResult, SearchError> {
    if !req.root.is_dir() {
        return Err(SearchError::RootNotFound(req.root.clone()));
    }
    if req.keyword.is_empty() {
        return Err(SearchError::EmptyKeyword);
    }
    let files = text_files(&req.root);
    scan_files(req, files, hooks)
}

/// Scans an already enumerated file list. Files that vanished or cannot be
/// read since enumeration contribute nothing but still count as scanned.
pub(super) fn scan_files(req: &SearchRequest, files: Vec<PathBuf>, hooks: &SearchHooks) -> Result<SearchResult, SearchError> {
    let out_path = resolve_output_path(req.output_path.as_deref(), &req.results_dir, &req.keyword)
        .map_err(|source| SearchError::Output {
            path: req.results_dir.clone(),
            source,
        })?;
    let out_file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&out_path)
        .map_err(|source| SearchError::Output {
            path: out_path.clone(),
            source,
        })?;

    let total = files.len();
    let workers = req
        .max_workers
        .map(clamp_workers)
        .unwrap_or_else(default_worker_count)
        .min(total.max(1));
    tracing::info!(
        keyword = %req.keyword,
        root = %req.root.display(),
        total_files = total,
        workers,
        "search started"
    );

    let needle = Arc::new(req.keyword.to_lowercase());
    let sink = Arc::new(Mutex::new(out_file));
    let queue: Arc<Mutex<VecDeque<PathBuf>>> = Arc::new(Mutex::new(files.into_iter().collect()));
    let halt = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<FileScan>();

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let needle = Arc::clone(&needle);
        let sink = Arc::clone(&sink);
        let queue = Arc::clone(&queue);
        let worker_halt = Arc::clone(&halt);
        let tx = tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("search-worker-{}", i))
            .spawn(move || loop {
                if worker_halt.load(Ordering::Relaxed) {
                    break;
                }
                let next = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(poisoned) => poisoned.into_inner().pop_front(),
                };
                let Some(path) = next else {
                    break;
                };
                let matches = scan_file(&path, &needle, &sink, &worker_halt);
                if tx.send(FileScan { path, matches }).is_err() {
                    break;
                }
            });
        match spawned {
            Ok(h) => handles.push(h),
            Err(e) if handles.is_empty() => {
                return Err(SearchError::WorkerSpawn(e));
            }
            Err(e) => {
                tracing::warn!("running with {} search workers: {}", handles.len(), e);
                break;
            }
        }
    }
    drop(tx);

    let mut consumed = 0usize;
    let mut lines_found = 0u64;
    let mut cancelled = false;
    while consumed < total {
        if hooks.cancelled() {
            cancelled = true;
            halt.store(true, Ordering::Relaxed);
            break;
        }
        let scan = match rx.recv_timeout(CANCEL_POLL) {
            Ok(scan) => scan,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        consumed += 1;
        lines_found += scan.matches;
        hooks.progress(&ScanProgress {
            total_files: total,
            files_scanned: consumed,
            matches_found: lines_found,
            percent_complete: percent(consumed, total),
            current_file: display_name(&req.root, &scan.path),
        });
    }

    if cancelled {
        tracing::info!(scanned = consumed, total_files = total, "search cancelled");
    } else {
        for h in handles {
            if h.join().is_err() {
                tracing::error!("search worker panicked");
            }
        }
    }

    // Workers that all died before reporting leave nothing consumed.
    let scanned_files = if consumed == 0 && !cancelled { total } else { consumed };
    let output_path = std::fs::canonicalize(&out_path).unwrap_or(out_path);
    tracing::info!(
        scanned = scanned_files,
        lines_found,
        output = %output_path.display(),
        "search finished"
    );
    Ok(SearchResult {
        scanned_files,
        lines_found,
        output_path,
    })
}
