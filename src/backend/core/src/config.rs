//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{PostwatchError, Result};

/// Browser-like User-Agent used for image downloads.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Image cache configuration
    #[serde(default)]
    pub images: ImageConfig,

    /// External collector configuration
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Directory holding cached images
    #[serde(default = "default_images_dir")]
    pub dir: PathBuf,

    /// Per-request timeout for image downloads
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Largest accepted image payload in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// JPEG quality of the canonical encoding (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Number of images downloaded in parallel during one replace
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,

    /// User-Agent sent with image requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            max_bytes: default_max_bytes(),
            jpeg_quality: default_jpeg_quality(),
            download_concurrency: default_download_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Program and arguments of the external collector
    #[serde(default)]
    pub command: Vec<String>,

    /// Hard limit for one collector run
    #[serde(default = "default_collector_timeout_secs")]
    pub timeout_secs: u64,

    /// Where to keep the raw JSON of the last successful run
    #[serde(default)]
    pub raw_output_path: Option<PathBuf>,

    /// Required prefix of every post URL
    #[serde(default = "default_post_url_prefix")]
    pub post_url_prefix: String,

    /// Path fragment every post URL must contain
    #[serde(default = "default_post_path_marker")]
    pub post_path_marker: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_collector_timeout_secs(),
            raw_output_path: None,
            post_url_prefix: default_post_url_prefix(),
            post_path_marker: default_post_path_marker(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Run the scheduler inside the server process
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Days between runs
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,

    /// First hour (inclusive) of the jitter window
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,

    /// Last hour (exclusive) of the jitter window
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,

    /// Pause after a failed trigger
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_days: default_interval_days(),
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_static_dir() -> PathBuf { PathBuf::from("static") }
fn default_database_url() -> String { "sqlite://postwatch.db".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_images_dir() -> PathBuf { PathBuf::from("static/images") }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_max_bytes() -> usize { 20 * 1024 * 1024 }
fn default_jpeg_quality() -> u8 { 85 }
fn default_download_concurrency() -> usize { 2 }
fn default_user_agent() -> String { DEFAULT_USER_AGENT.to_string() }
fn default_collector_timeout_secs() -> u64 { 900 }
fn default_post_url_prefix() -> String { "https://www.instagram.com/".to_string() }
fn default_post_path_marker() -> String { "/p/".to_string() }
fn default_scheduler_enabled() -> bool { true }
fn default_interval_days() -> u32 { 3 }
fn default_start_hour() -> u32 { 9 }
fn default_end_hour() -> u32 { 17 }
fn default_cooldown_secs() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }

/// Environment source; list values are comma separated.
fn environment() -> config::Environment {
    config::Environment::with_prefix("POSTWATCH")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("collector.command")
        .with_list_parse_key("server.cors_origins")
        .try_parsing(true)
}

impl Config {
    /// Load configuration from the environment (`POSTWATCH__SECTION__KEY`).
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would make a component misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        if s.end_hour > 24 {
            return Err(PostwatchError::configuration(format!(
                "scheduler.end_hour must be at most 24, got {}",
                s.end_hour
            )));
        }
        if s.start_hour >= s.end_hour {
            return Err(PostwatchError::configuration(format!(
                "scheduler window is empty: start_hour {} >= end_hour {}",
                s.start_hour, s.end_hour
            )));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(PostwatchError::configuration(format!(
                "images.jpeg_quality must be within 1..=100, got {}",
                self.images.jpeg_quality
            )));
        }
        if self.images.download_concurrency == 0 {
            return Err(PostwatchError::configuration(
                "images.download_concurrency must be at least 1",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(PostwatchError::configuration(
                "database.max_connections must be at least 1",
            ));
        }
        Ok(())
    }
}
