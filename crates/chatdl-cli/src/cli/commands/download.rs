//! `chatdl download` – one worker run with live progress.

use anyhow::{bail, Result};
use chatdl_core::downloader::DownloadStats;
use chatdl_core::service::{DownloadStart, Services, ShutdownOutcome};
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

fn progress_line(stats: &DownloadStats) -> String {
    format!(
        "  {}/{} ({}%)  downloaded {}  failed {}  skipped {}  {}",
        stats.processed,
        stats.total_to_download,
        stats.percent,
        stats.downloaded,
        stats.failed,
        stats.skipped,
        stats.current_file.as_deref().unwrap_or("")
    )
}

pub async fn run_download(services: &Services, timeout: Option<u64>) -> Result<()> {
    let job_id = match services.download.start().await {
        DownloadStart::Started(id) => id,
        DownloadStart::AlreadyRunning(_) => bail!("a download run is already active"),
        DownloadStart::StillStopping => bail!("the previous download run is still stopping"),
    };
    println!("download job {}", job_id);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut last_line = String::new();
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("stopping (waiting for the current file)...");
                match services.download.stop(false, timeout.map(Duration::from_secs)).await {
                    ShutdownOutcome::Stopped => println!("stopped"),
                    ShutdownOutcome::Cancelled => println!("grace period elapsed, run cancelled"),
                    ShutdownOutcome::NotRunning => {}
                }
                break;
            }
            _ = ticker.tick() => {
                let status = services.download.status();
                let line = progress_line(&status.stats);
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
                let finished = services
                    .registry
                    .get(job_id)
                    .map(|job| job.status.is_terminal())
                    .unwrap_or(true);
                if finished {
                    break;
                }
            }
        }
    }
    services.download.wait(None).await;

    let status = services.download.status();
    let stats = &status.stats;
    if let Some(job) = services.registry.get(job_id) {
        println!("job {}: {}", job.id, job.status.as_str());
        if let Some(err) = job.error {
            println!("  error: {}", err);
        }
    }
    println!(
        "  candidates {}  already present {}  to download {}",
        stats.total_candidates, stats.already_present, stats.total_to_download
    );
    println!(
        "  downloaded {}  failed {}  skipped {}  (overall {} files)",
        stats.downloaded, stats.failed, stats.skipped, status.overall_downloaded
    );
    Ok(())
}
