//! Paged listings of the downloaded corpus and of search result files.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::search::is_text_file;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the listed directory, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePage {
    /// Files across all pages.
    pub count: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("cannot delete {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn entry(base: &Path, path: &Path, meta: &std::fs::Metadata) -> FileEntry {
    let relative = path.strip_prefix(base).unwrap_or(path);
    FileEntry {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        relative_path: relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        size: meta.len(),
        modified: meta.modified().map(DateTime::<Utc>::from).unwrap_or_default(),
    }
}

fn paginate(mut files: Vec<FileEntry>, page: usize, per_page: usize) -> FilePage {
    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.relative_path.cmp(&b.relative_path)));
    let per_page = per_page.max(1);
    let count = files.len();
    let total_pages = count.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let files = files.into_iter().skip((page - 1) * per_page).take(per_page).collect();
    FilePage {
        count,
        page,
        per_page,
        total_pages,
        files,
    }
}

/// Every `.txt` file under `root`, newest first. A missing root lists nothing.
pub fn list_corpus(root: &Path, page: usize, per_page: usize) -> FilePage {
    let files = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_text_file(e.path()))
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            Some(entry(root, e.path(), &meta))
        })
        .collect();
    paginate(files, page, per_page)
}

/// Files directly inside `results_dir`, newest first.
pub fn list_results(results_dir: &Path, page: usize, per_page: usize) -> FilePage {
    let files = match std::fs::read_dir(results_dir) {
        Ok(dir) => dir
            .filter_map(Result::ok)
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                meta.is_file().then(|| entry(results_dir, &e.path(), &meta))
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    paginate(files, page, per_page)
}

/// Deletes one result file. Only bare file names are accepted.
pub fn delete_result(results_dir: &Path, name: &str) -> Result<PathBuf, LibraryError> {
    let mut components = Path::new(name).components();
    let bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !bare || name.contains('\\') {
        return Err(LibraryError::InvalidName(name.to_string()));
    }
    let path = results_dir.join(name);
    if !path.is_file() {
        return Err(LibraryError::NotFound(name.to_string()));
    }
    std::fs::remove_file(&path).map_err(|source| LibraryError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "result file deleted");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, body: &str, age_secs: u64) {
        fs::write(path, body).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn corpus_is_recursive_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("old.txt"), "a", 300);
        touch(&dir.path().join("sub/new.TXT"), "bb", 10);
        touch(&dir.path().join("image.png"), "x", 5);

        let page = list_corpus(dir.path(), 1, 10);
        assert_eq!(page.count, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.files[0].relative_path, "sub/new.TXT");
        assert_eq!(page.files[0].size, 2);
        assert_eq!(page.files[1].name, "old.txt");
    }

    #[test]
    fn paging_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5u64 {
            touch(&dir.path().join(format!("f{}.txt", i)), "x", 100 - i);
        }
        let page = list_corpus(dir.path(), 99, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.files[0].name, "f0.txt");

        let page = list_corpus(dir.path(), 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.files[0].name, "f4.txt");

        let empty = list_corpus(&dir.path().join("missing"), 1, 10);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.total_pages, 1);
    }

    #[test]
    fn results_listing_is_flat() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("search_results_a.txt"), "x", 1);
        touch(&dir.path().join("nested/inner.txt"), "x", 1);
        let page = list_results(dir.path(), 1, 10);
        assert_eq!(page.count, 1);
        assert_eq!(page.files[0].name, "search_results_a.txt");
    }

    #[test]
    fn delete_rejects_paths_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("r.txt"), "x", 1);
        assert!(matches!(delete_result(dir.path(), "../r.txt"), Err(LibraryError::InvalidName(_))));
        assert!(matches!(delete_result(dir.path(), "a/r.txt"), Err(LibraryError::InvalidName(_))));
        assert!(matches!(delete_result(dir.path(), "/etc/passwd"), Err(LibraryError::InvalidName(_))));
        assert!(matches!(delete_result(dir.path(), ".."), Err(LibraryError::InvalidName(_))));
        assert!(matches!(delete_result(dir.path(), "nope.txt"), Err(LibraryError::NotFound(_))));

        let removed = delete_result(dir.path(), "r.txt").unwrap();
        assert!(!removed.exists());
    }
}
