//! Tests for history, files, results, results-rm, stats.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_history() {
    match parse(&["chatdl", "history"]) {
        CliCommand::History { limit } => assert_eq!(limit, 20),
        _ => panic!("expected History"),
    }
    match parse(&["chatdl", "history", "--limit", "5"]) {
        CliCommand::History { limit } => assert_eq!(limit, 5),
        _ => panic!("expected History with --limit"),
    }
}

#[test]
fn cli_parse_files_paging() {
    match parse(&["chatdl", "files"]) {
        CliCommand::Files { page, per_page } => {
            assert_eq!(page, 1);
            assert_eq!(per_page, 50);
        }
        _ => panic!("expected Files"),
    }
    match parse(&["chatdl", "results", "--page", "3", "--per-page", "10"]) {
        CliCommand::Results { page, per_page } => {
            assert_eq!(page, 3);
            assert_eq!(per_page, 10);
        }
        _ => panic!("expected Results"),
    }
}

#[test]
fn cli_parse_results_rm() {
    match parse(&["chatdl", "results-rm", "search_results_x.txt"]) {
        CliCommand::ResultsRm { name } => assert_eq!(name, "search_results_x.txt"),
        _ => panic!("expected ResultsRm"),
    }
    assert!(Cli::try_parse_from(["chatdl", "results-rm"]).is_err());
}

#[test]
fn cli_parse_stats() {
    match parse(&["chatdl", "stats"]) {
        CliCommand::Stats => {}
        _ => panic!("expected Stats"),
    }
}
