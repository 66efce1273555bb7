//! Remote item metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::naming;

/// Chat metadata returned when resolving the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One message with a file attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub content_type: Option<String>,
    pub byte_size: u64,
    pub display_name: Option<String>,
}

impl RemoteItem {
    /// Plain-text attachments: `text/plain` MIME type or a `.txt` name.
    pub fn is_text_candidate(&self) -> bool {
        if self
            .content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/plain"))
            .unwrap_or(false)
        {
            return true;
        }
        self.display_name
            .as_deref()
            .map(|n| n.to_ascii_lowercase().ends_with(".txt"))
            .unwrap_or(false)
    }

    pub fn identity(&self) -> String {
        naming::item_identity(self.id, self.timestamp)
    }

    pub fn local_filename(&self) -> String {
        naming::item_filename(self.display_name.as_deref(), self.id, self.timestamp)
    }
}
