//! `chatdl search` – one search job; Ctrl-C cancels it cooperatively.

use anyhow::Result;
use chatdl_core::jobs::JobProgress;
use chatdl_core::service::{SearchOptions, Services};
use std::path::PathBuf;
use std::time::Duration;

pub async fn run_search(
    services: &Services,
    keyword: String,
    workers: Option<usize>,
    root: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (job_id, task) = services.search.spawn(SearchOptions {
        keyword,
        root,
        output_path: output,
        max_workers: workers,
    });
    tokio::pin!(task);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut cancel_sent = false;
    let mut last_percent = None;
    let joined = loop {
        tokio::select! {
            joined = &mut task => break joined,
            _ = &mut ctrl_c, if !cancel_sent => {
                println!("cancelling search...");
                services.registry.request_cancel(job_id);
                cancel_sent = true;
            }
            _ = ticker.tick() => {
                if let Some(JobProgress::Search(p)) = services.registry.get(job_id).map(|j| j.progress) {
                    if p.percent_complete.is_some() && p.percent_complete != last_percent {
                        println!(
                            "  {}/{} files ({}%)  {} matches",
                            p.files_scanned.unwrap_or(0),
                            p.total_files.unwrap_or(0),
                            p.percent_complete.unwrap_or(0),
                            p.matches_found.unwrap_or(0)
                        );
                        last_percent = p.percent_complete;
                    }
                }
            }
        }
    };

    let result = joined??;
    if let Some(job) = services.registry.get(job_id) {
        println!("job {}: {}", job.id, job.status.as_str());
    }
    println!("scanned_files: {}", result.scanned_files);
    println!("lines_found:   {}", result.lines_found);
    println!("output_path:   {}", result.output_path.display());
    Ok(())
}
