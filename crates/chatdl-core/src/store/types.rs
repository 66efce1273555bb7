//! Row types for the store.

use serde::Serialize;

/// Where a tracked file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOrigin {
    Remote,
    Search,
}

impl FileOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            FileOrigin::Remote => "remote",
            FileOrigin::Search => "search",
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "remote" => Some(FileOrigin::Remote),
            "search" => Some(FileOrigin::Search),
            _ => None,
        }
    }
}

/// Final (or current) status of a persisted job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Running,
    Finished,
    Failed,
    Stopped,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Running => "running",
            RecordStatus::Finished => "finished",
            RecordStatus::Failed => "failed",
            RecordStatus::Stopped => "stopped",
        }
    }

    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "running" => RecordStatus::Running,
            "finished" => RecordStatus::Finished,
            "stopped" => RecordStatus::Stopped,
            _ => RecordStatus::Failed,
        }
    }
}

/// One row of `job_records`, newest first in listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: i64,
    pub job_type: String,
    pub status: RecordStatus,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub details: serde_json::Value,
}

/// Count of tracked files per origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OriginBreakdown {
    pub remote: u64,
    pub search: u64,
}

impl OriginBreakdown {
    pub fn total(&self) -> u64 {
        self.remote + self.search
    }
}
