//! Output file location for search results.

use std::path::{Path, PathBuf};

use crate::naming::{file_stamp_now, keyword_slug};

/// Returns `explicit` when given, otherwise
/// `<results_dir>/search_results_<slug>_<stamp>.txt` (creating `results_dir`).
///
/// Two runs for the same keyword within one second share a file.
pub fn resolve_output_path(
    explicit: Option<&Path>,
    results_dir: &Path,
    keyword: &str,
) -> std::io::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    std::fs::create_dir_all(results_dir)?;
    Ok(results_dir.join(format!(
        "search_results_{}_{}.txt",
        keyword_slug(keyword),
        file_stamp_now()
    )))
}
