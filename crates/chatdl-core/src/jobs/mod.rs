//! In-memory job registry: lifecycle, typed progress, and cooperative cancellation.
//!
//! Every download run and search run is tracked here. Consumers poll
//! [`JobRegistry::is_cancelled`] at their own safe points; the registry never
//! interrupts work itself.

mod progress;
mod registry;
mod types;

pub use progress::{DownloadProgress, JobProgress, SearchProgress};
pub use registry::JobRegistry;
pub use types::{Job, JobId, JobKind, JobStatus};
