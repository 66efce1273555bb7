//! Local naming for remote items: filenames, identities, and display sizes.
//!
//! Filenames come from the remote display name when present, otherwise from
//! the item timestamp and id. Identities are the stable dedupe keys stored in
//! the persistence layer.

mod clock;
mod sanitize;

pub use clock::{file_stamp, file_stamp_now, unix_timestamp};
pub use sanitize::{keyword_slug, sanitize_filename, UNNAMED_FILE};

use chrono::{DateTime, Utc};

/// Local filename for a remote item.
///
/// Uses the sanitized display name if the source provided one; otherwise
/// `file_<stamp>_<id>.txt` with the stamp in UTC+8.
pub fn item_filename(display_name: Option<&str>, id: i64, timestamp: DateTime<Utc>) -> String {
    match display_name.filter(|n| !n.trim().is_empty()) {
        Some(name) => sanitize_filename(name),
        None => format!("file_{}_{}.txt", file_stamp(timestamp), id),
    }
}

/// Stable dedupe identity: remote id plus Unix timestamp.
pub fn item_identity(id: i64, timestamp: DateTime<Utc>) -> String {
    format!("{}_{}", id, timestamp.timestamp())
}

/// Formats a byte count for log lines (`1.5 MB`).
pub fn format_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = size_bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
