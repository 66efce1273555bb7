//! `chatdl files`, `chatdl results`, `chatdl results-rm`.

use anyhow::Result;
use chatdl_core::config::ChatdlConfig;
use chatdl_core::library::{self, FilePage};
use chatdl_core::naming::format_size;

fn print_page(page: &FilePage) {
    if page.count == 0 {
        println!("No files.");
        return;
    }
    println!("{:<10} {:<20} {}", "SIZE", "MODIFIED", "PATH");
    for f in &page.files {
        println!(
            "{:<10} {:<20} {}",
            format_size(f.size),
            f.modified.format("%Y-%m-%d %H:%M:%S"),
            f.relative_path
        );
    }
    println!(
        "page {}/{} ({} files, {} per page)",
        page.page, page.total_pages, page.count, page.per_page
    );
}

pub fn run_files(cfg: &ChatdlConfig, page: usize, per_page: usize) {
    print_page(&library::list_corpus(&cfg.download.download_dir, page, per_page));
}

pub fn run_results(cfg: &ChatdlConfig, page: usize, per_page: usize) {
    print_page(&library::list_results(&cfg.search.results_dir, page, per_page));
}

pub fn run_results_rm(cfg: &ChatdlConfig, name: &str) -> Result<()> {
    let path = library::delete_result(&cfg.search.results_dir, name)?;
    println!("deleted {}", path.display());
    Ok(())
}
