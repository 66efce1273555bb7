pub mod config;
pub mod logging;

pub mod downloader;
pub mod jobs;
pub mod library;
pub mod naming;
pub mod retry;
pub mod search;
pub mod service;
pub mod source;
pub mod store;
