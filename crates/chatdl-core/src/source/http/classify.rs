//! Classify HTTP responses from the history endpoint.

use std::time::Duration;

/// Wait used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    RateLimited,
    Retryable,
    NotFound,
    Fatal,
}

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> StatusClass {
    match code {
        200..=299 => StatusClass::Success,
        429 => StatusClass::RateLimited,
        500..=599 => StatusClass::Retryable,
        404 | 410 => StatusClass::NotFound,
        _ => StatusClass::Fatal,
    }
}

/// Parse a `Retry-After` value given in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Parse the status code out of a status line (`HTTP/1.1 200 OK`).
pub fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}
