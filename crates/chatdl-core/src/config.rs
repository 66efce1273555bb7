use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote history source (`[source]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the chat-history HTTP endpoint.
    pub base_url: String,
    /// Target chat id or handle.
    pub chat: String,
    /// Optional bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            chat: "me".to_string(),
            token: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Download worker limits (`[download]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub download_dir: PathBuf,
    /// Size limit in whole megabytes; must be positive.
    pub max_file_size_mb: u64,
    /// Skip items older than this many days (0 = no limit).
    #[serde(default)]
    pub max_file_age_days: u64,
    /// Re-enumerate the remote chat periodically during long runs.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Grace period for a stop request before the worker is force-cancelled.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval_secs() -> u64 {
    30 * 60
}

fn default_stop_timeout_secs() -> u64 {
    10
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("output/downloaded"),
            max_file_size_mb: 500,
            max_file_age_days: 0,
            auto_refresh: true,
            refresh_interval_secs: default_refresh_interval_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl DownloadConfig {
    /// Canonical byte limit derived from `max_file_size_mb`.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Search defaults (`[search]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub results_dir: PathBuf,
    /// Worker pool size; `None` uses the CPU-based default.
    #[serde(default)]
    pub max_workers: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("output/searched"),
            max_workers: None,
        }
    }
}

/// Retry policy parameters (`[retry]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per item (including the first).
    pub max_attempts: u32,
    /// Wait in seconds after the first transient failure.
    pub backoff_base_secs: u64,
    /// Extra seconds added for each further failure.
    pub backoff_step_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_secs: 30,
            backoff_step_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/chatdl/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatdlConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// SQLite database; defaults to `~/.local/state/chatdl/chatdl.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl ChatdlConfig {
    /// Rejects settings the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.download.max_file_size_mb == 0 {
            bail!("download.max_file_size_mb must be a positive integer (MB)");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.source.chat.trim().is_empty() {
            bail!("source.chat must not be empty");
        }
        Ok(())
    }

    /// Makes relative directory paths relative to `base` (the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        fn to_abs(base: &Path, p: &mut PathBuf) {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
        to_abs(base, &mut self.download.download_dir);
        to_abs(base, &mut self.search.results_dir);
        if let Some(db) = self.db_path.as_mut() {
            to_abs(base, db);
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("chatdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default database location under the XDG state dir.
pub fn default_db_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("chatdl")?;
    Ok(xdg_dirs.get_state_home().join("chatdl").join("chatdl.db"))
}

/// Parse, resolve and validate a config file at `path`.
pub fn load_from_path(path: &Path) -> Result<ChatdlConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let mut cfg: ChatdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    if let Some(dir) = path.parent() {
        cfg.resolve_paths(dir);
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ChatdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ChatdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
    }
    load_from_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ChatdlConfig::default();
        assert_eq!(cfg.download.max_file_size_mb, 500);
        assert_eq!(cfg.download.max_file_size_bytes(), 500 * 1024 * 1024);
        assert_eq!(cfg.download.max_file_age_days, 0);
        assert!(cfg.download.auto_refresh);
        assert_eq!(cfg.download.refresh_interval(), Duration::from_secs(1800));
        assert_eq!(cfg.retry.max_attempts, 5);
        assert!(cfg.search.max_workers.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ChatdlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ChatdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.source.base_url, cfg.source.base_url);
        assert_eq!(parsed.download.download_dir, cfg.download.download_dir);
        assert_eq!(parsed.search.results_dir, cfg.search.results_dir);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            [source]
            base_url = "https://history.example.com"
            chat = "-100123"
            token = "secret"

            [download]
            download_dir = "/srv/chat"
            max_file_size_mb = 20
            max_file_age_days = 30
            auto_refresh = false

            [search]
            results_dir = "/srv/results"
            max_workers = 8

            [retry]
            max_attempts = 3
            backoff_base_secs = 5
            backoff_step_secs = 10
        "#;
        let cfg: ChatdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.source.chat, "-100123");
        assert_eq!(cfg.source.token.as_deref(), Some("secret"));
        assert_eq!(cfg.source.request_timeout_secs, 300);
        assert_eq!(cfg.download.max_file_size_bytes(), 20 * 1024 * 1024);
        assert!(!cfg.download.auto_refresh);
        assert_eq!(cfg.download.refresh_interval_secs, 1800);
        assert_eq!(cfg.search.max_workers, Some(8));
        assert_eq!(cfg.retry.backoff_step_secs, 10);
    }

    #[test]
    fn validate_rejects_zero_size_limit() {
        let mut cfg = ChatdlConfig::default();
        cfg.download.max_file_size_mb = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_resolves_relative_dirs_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            db_path = "state/app.db"
            [download]
            download_dir = "dl"
            max_file_size_mb = 1
            [search]
            results_dir = "/abs/results"
            "#,
        )
        .unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.download.download_dir, dir.path().join("dl"));
        assert_eq!(cfg.search.results_dir, PathBuf::from("/abs/results"));
        assert_eq!(cfg.db_path, Some(dir.path().join("state/app.db")));
    }
}
