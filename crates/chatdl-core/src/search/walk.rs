//! Corpus enumeration: every regular file with a `.txt` extension (any case).

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// Recursively lists text files under `root`, sorted by path.
///
/// Unreadable directory entries are skipped.
pub fn text_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::debug!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_text_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}
