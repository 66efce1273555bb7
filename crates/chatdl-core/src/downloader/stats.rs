//! Live counters for one download run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jobs::DownloadProgress;

/// Snapshot of the current (or last) run. Replaced wholesale when a run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    pub downloaded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub already_present: u64,
    /// Eligible items seen on the remote side.
    pub total_candidates: u64,
    /// Candidates not yet downloaded when the run started.
    pub total_to_download: u64,
    pub processed: u64,
    pub percent: u8,
    pub current_index: usize,
    pub current_file: Option<String>,
    pub in_progress: bool,
    pub last_update: Option<DateTime<Utc>>,
}

/// `floor(100 * min(done, total) / total)`, or 100 for an empty total.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}

impl DownloadStats {
    /// Recompute the derived counters after an item outcome.
    pub fn update_progress(&mut self) {
        self.processed = self.downloaded + self.failed + self.skipped;
        self.percent = percent_of(self.processed, self.total_to_download);
        self.last_update = Some(Utc::now());
    }

    /// Registry payload for these stats.
    pub fn to_progress(&self, chat: &str) -> DownloadProgress {
        DownloadProgress {
            chat: Some(chat.to_string()),
            downloaded: Some(self.downloaded),
            failed: Some(self.failed),
            skipped: Some(self.skipped),
            already_present: Some(self.already_present),
            total_candidates: Some(self.total_candidates),
            total_to_download: Some(self.total_to_download),
            processed: Some(self.processed),
            percent: Some(self.percent),
            current_index: Some(self.current_index),
            current_file: self.current_file.clone(),
        }
    }

    /// Details stored on the closed job record.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "downloaded": self.downloaded,
            "failed": self.failed,
            "skipped": self.skipped,
            "total_candidates": self.total_candidates,
            "total_to_download": self.total_to_download,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_floors_and_caps() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 66);
        assert_eq!(percent_of(5, 3), 100);
    }

    #[test]
    fn update_progress_derives_processed() {
        let mut stats = DownloadStats {
            downloaded: 1,
            skipped: 1,
            total_to_download: 4,
            ..DownloadStats::default()
        };
        stats.update_progress();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.percent, 50);
        assert!(stats.last_update.is_some());
    }
}
