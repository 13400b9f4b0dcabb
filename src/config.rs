use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Search engine configuration
    pub elasticsearch: ElasticsearchConfig,

    /// Change feed configuration
    pub feed: FeedConfig,

    /// Indexing pipeline configuration
    pub indexing: IndexingConfig,

    /// Session collaborator configuration
    pub session: SessionConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from embedded defaults, file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SEARCHSYNC_)
            .add_source(
                config::Environment::with_prefix("SEARCHSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Validate configuration that must be present before serving anything.
    ///
    /// The session secret identifies users; without it every search would be
    /// anonymous, so its absence is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.session.secret.trim().is_empty() {
            return Err(AppError::Configuration(
                "'session.secret' must be set (config file or SEARCHSYNC__SESSION__SECRET)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Address of the search engine, full URL starting with http(s)
    pub url: String,

    /// Index name documents are mirrored into
    #[serde(default = "default_index")]
    pub index: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_elastic_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Address of the change feed endpoint (NDJSON event stream)
    pub url: String,

    /// Backoff between reconnect attempts (seconds)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Debounce window for update events, per document (seconds)
    #[serde(default = "default_throttle_delay")]
    pub throttle_delay_secs: u64,

    /// Whether to index documents carrying no data-auth annotation
    #[serde(default)]
    pub index_permissionless_documents: bool,
}

impl IndexingConfig {
    /// Throttle window as a Duration
    pub fn throttle_delay(&self) -> Duration {
        Duration::from_secs(self.throttle_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Shared secret of the session collaborator. Required.
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7010
}

fn default_request_timeout() -> u64 {
    30
}

fn default_index() -> String {
    "documents".to_string()
}

fn default_elastic_timeout() -> u64 {
    10
}

fn default_retry_backoff() -> u64 {
    5
}

fn default_throttle_delay() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
