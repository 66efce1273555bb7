//! Wall-clock helpers: Unix seconds for the database, UTC+8 stamps for filenames.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Offset used for every human-facing timestamp in generated filenames.
const STAMP_OFFSET_SECS: i32 = 8 * 3600;

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn stamp_zone() -> FixedOffset {
    FixedOffset::east_opt(STAMP_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Formats `at` as `YYYYmmdd_HHMMSS` in UTC+8 (second granularity).
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&stamp_zone())
        .format("%Y%m%d_%H%M%S")
        .to_string()
}

/// [`file_stamp`] for the current instant.
pub fn file_stamp_now() -> String {
    file_stamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamp_is_shifted_eight_hours() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 20, 15, 5).unwrap();
        assert_eq!(file_stamp(at), "20240302_041505");
    }
}
