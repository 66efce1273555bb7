//! CLI command handlers, one file per command group.

mod download;
mod files;
mod history;
mod search;

pub use download::run_download;
pub use files::{run_files, run_results, run_results_rm};
pub use history::{run_history, run_stats};
pub use search::run_search;
