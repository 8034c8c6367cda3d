//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable overriding the websocket URL
pub const URL_ENV: &str = "BITFINEX_WS_URL";

/// How a reconnect waits for its resubscriptions to be confirmed
///
/// A fixed number of polls, each bounded by `poll_interval_ms`. No backoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResubscribePolicy {
    #[serde(default = "default_resubscribe_polls")]
    pub polls: u32,
    #[serde(default = "default_resubscribe_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ResubscribePolicy {
    fn default() -> Self {
        Self {
            polls: default_resubscribe_polls(),
            poll_interval_ms: default_resubscribe_poll_interval_ms(),
        }
    }
}

impl ResubscribePolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upper bound of the whole resubscribe wait
    pub fn budget(&self) -> Duration {
        self.poll_interval() * self.polls
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Period of the liveness check and of the keep-alive ping
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Silence after which the session is considered dead
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,

    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub resubscribe: ResubscribePolicy,

    /// Snapshot events (orders, positions, wallets) awaited after auth
    #[serde(default = "default_readiness_contributors")]
    pub readiness_contributors: usize,

    /// Threads of the pool running slow per-event work
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            staleness_threshold_secs: default_staleness_threshold_secs(),
            auth_timeout_secs: default_auth_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            resubscribe: ResubscribePolicy::default(),
            readiness_contributors: default_readiness_contributors(),
            worker_threads: default_worker_threads(),
            log_level: default_log_level(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: SessionConfig = serde_yaml::from_str(&yaml_content)?;

        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.is_empty() {
                info!("Overriding websocket URL from environment variable");
                config.url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "url must be a ws:// or wss:// URL, got {}",
                self.url
            )));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.staleness_threshold_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::ValidationError(
                "staleness_threshold_secs must be greater than heartbeat_interval_secs".to_string(),
            ));
        }

        if self.auth_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "auth_timeout_secs and connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.resubscribe.polls == 0 {
            return Err(ConfigError::ValidationError(
                "resubscribe.polls must be greater than 0".to_string(),
            ));
        }

        if self.worker_threads == 0 {
            return Err(ConfigError::ValidationError(
                "worker_threads must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Events the readiness barrier waits for: auth plus every contributor
    pub fn required_ready_events(&self) -> usize {
        1 + self.readiness_contributors
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  URL: {}", self.url);
        info!(
            "  Heartbeat: every {}s, stale after {}s",
            self.heartbeat_interval_secs, self.staleness_threshold_secs
        );
        info!("  Auth timeout: {}s", self.auth_timeout_secs);
        info!(
            "  Resubscribe: {} polls x {}ms",
            self.resubscribe.polls, self.resubscribe.poll_interval_ms
        );
        info!("  Readiness contributors: {}", self.readiness_contributors);
        info!("  Worker threads: {}", self.worker_threads);
        info!("  Log level: {}", self.log_level);
    }
}

fn default_url() -> String {
    "wss://api.bitfinex.com/ws/2".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_staleness_threshold_secs() -> u64 {
    30
}

fn default_auth_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_resubscribe_polls() -> u32 {
    10
}

fn default_resubscribe_poll_interval_ms() -> u64 {
    500
}

fn default_readiness_contributors() -> usize {
    3
}

fn default_worker_threads() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
