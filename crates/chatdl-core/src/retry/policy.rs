use std::time::Duration;

use crate::config::RetryConfig;

/// Classification of a failed attempt for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source asked us to wait exactly this long.
    RateLimited(Duration),
    /// Remote/RPC failure, empty result, or size mismatch.
    Transient,
    /// Not worth retrying (e.g. the item is gone).
    Fatal,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed attempt budget with linear backoff: `base + step × attempt_index`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub backoff_base: Duration,
    /// Added per further failed attempt.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(30),
            backoff_step: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: Duration::from_secs(cfg.backoff_base_secs),
            backoff_step: Duration::from_secs(cfg.backoff_step_secs),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following a transient failure.
    ///
    /// `attempt` is 1-based (1 = first attempt).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1);
        self.backoff_base
            .saturating_add(self.backoff_step.saturating_mul(index))
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed.
    ///
    /// Rate-limit waits are taken verbatim and do not grow the backoff; they
    /// still consume an attempt.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Fatal => RetryDecision::NoRetry,
            ErrorKind::RateLimited(wait) => RetryDecision::RetryAfter(wait),
            ErrorKind::Transient => RetryDecision::RetryAfter(self.backoff(attempt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_for_fatal() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Fatal), RetryDecision::NoRetry);
    }

    #[test]
    fn transient_backoff_is_linear() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.decide(1, ErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(30))
        );
        assert_eq!(
            p.decide(2, ErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(60))
        );
        assert_eq!(
            p.decide(4, ErrorKind::Transient),
            RetryDecision::RetryAfter(Duration::from_secs(120))
        );
    }

    #[test]
    fn rate_limit_wait_is_exact() {
        let p = RetryPolicy::default();
        let wait = Duration::from_secs(7);
        assert_eq!(
            p.decide(3, ErrorKind::RateLimited(wait)),
            RetryDecision::RetryAfter(wait)
        );
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(matches!(
            p.decide(2, ErrorKind::Transient),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(3, ErrorKind::Transient), RetryDecision::NoRetry);
        assert_eq!(
            p.decide(3, ErrorKind::RateLimited(Duration::from_secs(1))),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn from_config_never_allows_zero_attempts() {
        let cfg = RetryConfig {
            max_attempts: 0,
            backoff_base_secs: 1,
            backoff_step_secs: 2,
        };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.backoff(2), Duration::from_secs(3));
    }
}
