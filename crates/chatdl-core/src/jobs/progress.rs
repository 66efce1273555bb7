//! Typed progress payloads, one per job kind.
//!
//! Every field is optional so a payload doubles as a patch: merging copies
//! the fields that are set and leaves the rest untouched.

use serde::Serialize;
use std::path::PathBuf;

use super::types::JobKind;

/// Copies each `Some` field of `$patch` into `$target`.
macro_rules! merge_fields {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $patch.$field {
                $target.$field = Some(v);
            }
        )+
    };
}

/// Progress of a search job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchProgress {
    pub keyword: Option<String>,
    pub total_files: Option<usize>,
    pub files_scanned: Option<usize>,
    pub matches_found: Option<u64>,
    pub percent_complete: Option<u8>,
    pub current_file: Option<String>,
    pub scanned_files: Option<usize>,
    pub lines_found: Option<u64>,
    pub output_path: Option<PathBuf>,
}

impl SearchProgress {
    pub fn merge(&mut self, patch: SearchProgress) {
        merge_fields!(self, patch;
            keyword, total_files, files_scanned, matches_found, percent_complete,
            current_file, scanned_files, lines_found, output_path);
    }
}

/// Progress of a download job (mirrors the worker's live stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub chat: Option<String>,
    pub downloaded: Option<u64>,
    pub failed: Option<u64>,
    pub skipped: Option<u64>,
    pub already_present: Option<u64>,
    pub total_candidates: Option<u64>,
    pub total_to_download: Option<u64>,
    pub processed: Option<u64>,
    pub percent: Option<u8>,
    pub current_index: Option<usize>,
    pub current_file: Option<String>,
}

impl DownloadProgress {
    pub fn merge(&mut self, patch: DownloadProgress) {
        merge_fields!(self, patch;
            chat, downloaded, failed, skipped, already_present, total_candidates,
            total_to_download, processed, percent, current_index, current_file);
    }
}

/// Progress payload tagged by job kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobProgress {
    Download(DownloadProgress),
    Search(SearchProgress),
}

impl JobProgress {
    /// Empty payload for `kind`.
    pub fn empty(kind: JobKind) -> Self {
        match kind {
            JobKind::Download => JobProgress::Download(DownloadProgress::default()),
            JobKind::Search => JobProgress::Search(SearchProgress::default()),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobProgress::Download(_) => JobKind::Download,
            JobProgress::Search(_) => JobKind::Search,
        }
    }

    /// Field-by-field merge. Returns false (and changes nothing) when the
    /// patch is for a different job kind.
    pub fn merge(&mut self, patch: JobProgress) -> bool {
        match (self, patch) {
            (JobProgress::Download(cur), JobProgress::Download(p)) => {
                cur.merge(p);
                true
            }
            (JobProgress::Search(cur), JobProgress::Search(p)) => {
                cur.merge(p);
                true
            }
            _ => false,
        }
    }
}
