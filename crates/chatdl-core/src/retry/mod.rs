//! Retry and backoff policy for single-item downloads.
//!
//! Failures are classified into rate-limit (exact wait from the source),
//! transient (linear backoff), and fatal (no retry). Every wait observes the
//! worker's stop signal so shutdown is never held up by a backoff.

mod policy;
mod run;

pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, sleep_or_stop, AttemptError, RetryOutcome};
