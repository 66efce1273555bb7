//! Tests for the search engine.

use super::*;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn request(root: &Path, keyword: &str, output: Option<PathBuf>, results_dir: &Path) -> SearchRequest {
    SearchRequest {
        keyword: keyword.to_string(),
        root: root.to_path_buf(),
        output_path: output,
        results_dir: results_dir.to_path_buf(),
        max_workers: Some(4),
    }
}

fn three_file_corpus(root: &Path) {
    fs::write(root.join("twice.txt"), "a needle here\nnothing\nNEEDLE again\n").unwrap();
    fs::write(root.join("once.txt"), "just one needle\n").unwrap();
    fs::write(root.join("none.txt"), "hay\nstack\n").unwrap();
}

#[test]
fn three_files_three_matches() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    three_file_corpus(corpus.path());

    let result = run_search(
        &request(corpus.path(), "needle", None, results.path()),
        &SearchHooks::default(),
    )
    .unwrap();

    assert_eq!(result.scanned_files, 3);
    assert_eq!(result.lines_found, 3);
    assert!(result.output_path.is_absolute());
    let content = fs::read_to_string(&result.output_path).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.lines().all(|l| l.to_lowercase().contains("needle")));
}

#[test]
fn synthesized_output_lives_in_results_dir() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    three_file_corpus(corpus.path());

    let result = run_search(
        &request(corpus.path(), "nee dle!", None, results.path()),
        &SearchHooks::default(),
    )
    .unwrap();
    let name = result.output_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("search_results_needle_"), "{}", name);
    assert!(name.ends_with(".txt"));
    let results_dir = fs::canonicalize(results.path()).unwrap();
    assert_eq!(result.output_path.parent().unwrap(), results_dir);
}

#[test]
fn only_text_files_are_scanned_recursively() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let nested = corpus.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("deep.TXT"), "needle\n").unwrap();
    fs::write(corpus.path().join("skip.log"), "needle\n").unwrap();
    fs::write(corpus.path().join("top.txt"), "needle\n").unwrap();

    let result = run_search(
        &request(corpus.path(), "needle", None, results.path()),
        &SearchHooks::default(),
    )
    .unwrap();
    assert_eq!(result.scanned_files, 2);
    assert_eq!(result.lines_found, 2);
}

#[test]
fn explicit_output_is_appended_not_truncated() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    three_file_corpus(corpus.path());
    let out = results.path().join("fixed.txt");

    let first = run_search(
        &request(corpus.path(), "needle", Some(out.clone()), results.path()),
        &SearchHooks::default(),
    )
    .unwrap();
    let after_first = fs::read_to_string(&out).unwrap();
    let second = run_search(
        &request(corpus.path(), "needle", Some(out.clone()), results.path()),
        &SearchHooks::default(),
    )
    .unwrap();
    let after_second = fs::read_to_string(&out).unwrap();

    assert_eq!(first.lines_found, second.lines_found);
    assert_eq!(after_second.len(), after_first.len() * 2);
    let mut a: Vec<&str> = after_first.lines().collect();
    let mut b: Vec<&str> = after_second.lines().skip(3).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn progress_is_monotonic_and_reaches_full() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    for i in 0..20 {
        let body = if i % 2 == 0 { "needle\n" } else { "hay\n" };
        fs::write(corpus.path().join(format!("f{:02}.txt", i)), body).unwrap();
    }
    let seen: Arc<Mutex<Vec<ScanProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let hooks = SearchHooks {
        on_progress: Some(Box::new(move |p| sink.lock().unwrap().push(p.clone()))),
        is_cancelled: None,
    };

    let result = run_search(&request(corpus.path(), "needle", None, results.path()), &hooks).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 20);
    assert!(seen.windows(2).all(|w| w[0].percent_complete <= w[1].percent_complete));
    assert!(seen.windows(2).all(|w| w[0].files_scanned < w[1].files_scanned));
    let last = seen.last().unwrap();
    assert_eq!(last.percent_complete, 100);
    assert_eq!(last.total_files, 20);
    assert_eq!(last.matches_found, result.lines_found);
    assert_eq!(result.lines_found, 10);
}

#[test]
fn cancellation_stops_consuming_and_counts_only_consumed() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    for i in 0..50 {
        fs::write(corpus.path().join(format!("f{:02}.txt", i)), "needle\nneedle\n").unwrap();
    }
    let cancel = Arc::new(AtomicBool::new(false));
    let set = Arc::clone(&cancel);
    let check = Arc::clone(&cancel);
    let hooks = SearchHooks {
        on_progress: Some(Box::new(move |_| set.store(true, Ordering::SeqCst))),
        is_cancelled: Some(Box::new(move || check.load(Ordering::SeqCst))),
    };

    let result = run_search(&request(corpus.path(), "needle", None, results.path()), &hooks).unwrap();
    assert_eq!(result.scanned_files, 1);
    assert_eq!(result.lines_found, 2);
}

#[test]
fn cancelled_before_start_scans_nothing() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    three_file_corpus(corpus.path());
    let hooks = SearchHooks {
        on_progress: None,
        is_cancelled: Some(Box::new(|| true)),
    };
    let result = run_search(&request(corpus.path(), "needle", None, results.path()), &hooks).unwrap();
    assert_eq!(result.scanned_files, 0);
    assert_eq!(result.lines_found, 0);
}

#[test]
fn empty_corpus_yields_empty_output() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let result = run_search(
        &request(corpus.path(), "needle", None, results.path()),
        &SearchHooks::default(),
    )
    .unwrap();
    assert_eq!(result.scanned_files, 0);
    assert_eq!(result.lines_found, 0);
    assert_eq!(fs::read_to_string(&result.output_path).unwrap(), "");
}

#[test]
fn validation_errors() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let missing = corpus.path().join("missing");
    let err = run_search(
        &request(&missing, "needle", None, results.path()),
        &SearchHooks::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::RootNotFound(_)));

    let err = run_search(
        &request(corpus.path(), "", None, results.path()),
        &SearchHooks::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::EmptyKeyword));
}

#[test]
fn worker_counts_are_bounded() {
    assert_eq!(clamp_workers(0), 1);
    assert_eq!(clamp_workers(500), MAX_WORKERS);
    assert_eq!(clamp_workers(7), 7);
    let d = default_worker_count();
    assert!((1..=32).contains(&d));
}

#[test]
fn file_removed_after_enumeration_does_not_abort_scan() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    three_file_corpus(corpus.path());
    let req = request(corpus.path(), "needle", None, results.path());

    let files = super::walk::text_files(corpus.path());
    assert_eq!(files.len(), 3);
    fs::remove_file(corpus.path().join("once.txt")).unwrap();

    let result = super::engine::scan_files(&req, files, &SearchHooks::default()).unwrap();
    assert_eq!(result.scanned_files, 3);
    assert_eq!(result.lines_found, 2);
    let content = fs::read_to_string(&result.output_path).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn unreadable_entries_contribute_nothing() {
    let corpus = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    three_file_corpus(corpus.path());
    let req = request(corpus.path(), "needle", None, results.path());

    let mut files = super::walk::text_files(corpus.path());
    files.push(corpus.path().join("never-existed.txt"));
    // A directory is listed but cannot be read as a file.
    let dir_entry = corpus.path().join("folder.txt");
    fs::create_dir(&dir_entry).unwrap();
    files.push(dir_entry);

    let result = super::engine::scan_files(&req, files, &SearchHooks::default()).unwrap();
    assert_eq!(result.scanned_files, 5);
    assert_eq!(result.lines_found, 3);
}
