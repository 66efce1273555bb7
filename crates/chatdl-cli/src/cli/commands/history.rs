//! `chatdl history` and `chatdl stats` – read the persistent store.

use anyhow::Result;
use chatdl_core::store::SqliteStore;
use chrono::{DateTime, Utc};

fn format_time(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn run_history(store: &SqliteStore, limit: u32) -> Result<()> {
    let records = store.list_job_records(limit).await?;
    if records.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }
    println!("{:<6} {:<9} {:<9} {:<20} {:<20} {}", "ID", "TYPE", "STATUS", "STARTED", "FINISHED", "DETAILS");
    for r in records {
        println!(
            "{:<6} {:<9} {:<9} {:<20} {:<20} {}",
            r.id,
            r.job_type,
            r.status.as_str(),
            format_time(r.started_at),
            r.finished_at.map(format_time).unwrap_or_else(|| "-".to_string()),
            r.details
        );
    }
    Ok(())
}

pub async fn run_stats(store: &SqliteStore) -> Result<()> {
    let breakdown = store.origin_breakdown().await?;
    println!("remote: {}", breakdown.remote);
    println!("search: {}", breakdown.search);
    println!("total:  {}", breakdown.total());
    Ok(())
}
