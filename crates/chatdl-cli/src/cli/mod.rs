//! CLI for the chatdl history downloader.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use chatdl_core::config::{self, ChatdlConfig};
use chatdl_core::service::Services;
use chatdl_core::source::HttpSource;
use chatdl_core::store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{
    run_download, run_files, run_history, run_results, run_results_rm, run_search, run_stats,
};

/// Top-level CLI for chatdl.
#[derive(Debug, Parser)]
#[command(name = "chatdl")]
#[command(about = "chatdl: mirror chat file attachments and search them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download new text attachments from the configured chat.
    Download {
        /// Grace period in seconds for Ctrl-C before the run is cancelled.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Search the downloaded files for a keyword (case-insensitive).
    Search {
        keyword: String,
        /// Worker threads (clamped to 1..=128).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Directory to scan instead of the download directory.
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Append matches to this file instead of a new result file.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show recent download and search runs.
    History {
        #[arg(long, default_value = "20", value_name = "N")]
        limit: u32,
    },

    /// List downloaded files, newest first.
    Files {
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50", value_name = "N")]
        per_page: usize,
    },

    /// List search result files, newest first.
    Results {
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50", value_name = "N")]
        per_page: usize,
    },

    /// Delete one search result file by name.
    ResultsRm { name: String },

    /// Count tracked files per origin.
    Stats,
}

async fn build_services(cfg: &ChatdlConfig, store: &SqliteStore) -> Result<Services> {
    let source = HttpSource::new(&cfg.source).context("invalid [source] configuration")?;
    Ok(Services::new(cfg, Arc::new(source), Arc::new(store.clone())).await)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        cfg.validate()?;
        tracing::debug!(
            chat = %cfg.source.chat,
            download_dir = %cfg.download.download_dir.display(),
            "config loaded"
        );
        let store = SqliteStore::open_default(cfg.db_path.as_deref()).await?;

        match cli.command {
            CliCommand::Download { timeout } => {
                let services = build_services(&cfg, &store).await?;
                run_download(&services, timeout).await?;
            }
            CliCommand::Search {
                keyword,
                workers,
                root,
                output,
            } => {
                let services = build_services(&cfg, &store).await?;
                run_search(&services, keyword, workers, root, output).await?;
            }
            CliCommand::History { limit } => run_history(&store, limit).await?,
            CliCommand::Files { page, per_page } => run_files(&cfg, page, per_page),
            CliCommand::Results { page, per_page } => run_results(&cfg, page, per_page),
            CliCommand::ResultsRm { name } => run_results_rm(&cfg, &name)?,
            CliCommand::Stats => run_stats(&store).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
