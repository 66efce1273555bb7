//! Retry loop: run an async attempt until success, exhaustion, or stop.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// A failed attempt, classified for the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AttemptError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn rate_limited(wait: Duration) -> Self {
        Self {
            kind: ErrorKind::RateLimited(wait),
            message: format!("rate limited for {}s", wait.as_secs()),
        }
    }
}

/// How a retried operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Done { value: T, attempts: u32 },
    /// Attempts ran out or the last error was fatal.
    Exhausted { attempts: u32, last_error: String },
    /// The stop signal was seen; this is a shutdown exit, not a failure.
    Interrupted,
}

/// Sleeps for `duration` unless `stop` fires first. Returns true if stopped.
pub async fn sleep_or_stop(stop: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return stop.is_cancelled();
    }
    tokio::select! {
        _ = stop.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Runs `attempt` (given the 1-based attempt number) until it succeeds or the
/// policy says to stop. The stop signal is checked at the top of every
/// attempt and interrupts every wait.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    stop: &CancellationToken,
    mut attempt: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut n = 1u32;
    loop {
        if stop.is_cancelled() {
            return RetryOutcome::Interrupted;
        }
        match attempt(n).await {
            Ok(value) => return RetryOutcome::Done { value, attempts: n },
            Err(e) => {
                tracing::warn!(
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    "attempt failed: {}",
                    e.message
                );
                match policy.decide(n, e.kind) {
                    RetryDecision::NoRetry => {
                        return RetryOutcome::Exhausted {
                            attempts: n,
                            last_error: e.message,
                        }
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::info!("retrying in {}s", d.as_secs_f64());
                        if sleep_or_stop(stop, d).await {
                            return RetryOutcome::Interrupted;
                        }
                        n += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_millis(1),
            backoff_step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let stop = CancellationToken::new();
        let out = run_with_retry(&fast_policy(), &stop, |n| async move {
            if n < 3 {
                Err(AttemptError::transient("flaky"))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(out, RetryOutcome::Done { value: 3, attempts: 3 });
    }

    #[tokio::test]
    async fn exhausts_budget() {
        let stop = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let out: RetryOutcome<()> = run_with_retry(&fast_policy(), &stop, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::transient("down")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(matches!(out, RetryOutcome::Exhausted { attempts: 5, .. }));
    }

    #[tokio::test]
    async fn fatal_stops_immediately() {
        let stop = CancellationToken::new();
        let out: RetryOutcome<()> =
            run_with_retry(&fast_policy(), &stop, |_| async { Err(AttemptError::fatal("gone")) }).await;
        assert_eq!(
            out,
            RetryOutcome::Exhausted {
                attempts: 1,
                last_error: "gone".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_exactly_then_retries() {
        let stop = CancellationToken::new();
        let started = tokio::time::Instant::now();
        let out = run_with_retry(&RetryPolicy::default(), &stop, |n| async move {
            if n == 1 {
                Err(AttemptError::rate_limited(Duration::from_secs(2)))
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!(out, RetryOutcome::Done { value: (), attempts: 2 });
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stop_before_first_attempt_is_interrupt() {
        let stop = CancellationToken::new();
        stop.cancel();
        let out: RetryOutcome<()> = run_with_retry(&fast_policy(), &stop, |_| async { Ok(()) }).await;
        assert_eq!(out, RetryOutcome::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_backoff() {
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let started = tokio::time::Instant::now();
        let out: RetryOutcome<()> = run_with_retry(&RetryPolicy::default(), &stop, |_| async {
            Err(AttemptError::transient("down"))
        })
        .await;
        assert_eq!(out, RetryOutcome::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
