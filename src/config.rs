//! Configuration Module
//!
//! This module defines all configuration structures for the simulator.
//! Configuration is loaded from TOML files and parsed using serde.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [api]
/// listen = "127.0.0.1:8080"
///
/// [logging]
/// level = "info"
///
/// [batch]
/// flush_period_secs = 10
/// max_block_size = 1000
/// flush_file = "blocks.json"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub batch: BatchConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind, e.g. "127.0.0.1:8080"
    pub listen: String,
}

/// Logging configuration
///
/// `level` is any `EnvFilter` directive ("info", "blocksim=debug", ...).
/// `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Build the log filter, preferring `RUST_LOG` over the configured level
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|_| ConfigError::LogLevel(self.level.clone())),
        }
    }
}

/// Block creation configuration
///
/// # Fields
/// - `flush_period_secs`: Seconds between timer-driven flushes
/// - `max_block_size`: Number of transactions that forces an immediate flush
/// - `flush_file`: File blocks are appended to
/// - `persist_retries`: Extra attempts after a failed write (0 drops the block)
/// - `retry_delay_ms`: Pause between attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub flush_period_secs: u64,
    pub max_block_size: usize,
    pub flush_file: PathBuf,
    #[serde(default)]
    pub persist_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    10
}

impl BatchConfig {
    pub fn new(flush_period_secs: u64, max_block_size: usize, flush_file: impl Into<PathBuf>) -> Self {
        Self {
            flush_period_secs,
            max_block_size,
            flush_file: flush_file.into(),
            persist_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    pub fn flush_period(&self) -> Duration {
        Duration::from_secs(self.flush_period_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_period_secs == 0 {
            return Err(ConfigError::Missing("batch.flush_period_secs"));
        }
        if self.max_block_size == 0 {
            return Err(ConfigError::Missing("batch.max_block_size"));
        }
        if self.flush_file.as_os_str().is_empty() {
            return Err(ConfigError::Missing("batch.flush_file"));
        }
        Ok(())
    }

    /// Open the flush file once in append mode to prove it is writable
    ///
    /// Creates the file if it does not exist yet; existing content is left
    /// untouched.
    pub fn check_flush_file(&self) -> Result<(), ConfigError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.flush_file)
            .map(drop)
            .map_err(|source| ConfigError::Unwritable {
                path: self.flush_file.clone(),
                source,
            })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// The result is validated but the flush file is not probed; call
    /// [`BatchConfig::check_flush_file`] before starting the scheduler.
    ///
    /// # Example
    /// ```no_run
    /// let config = blocksim::Config::load("config/default.toml")?;
    /// # Ok::<(), blocksim::error::ConfigError>(())
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.listen.trim().is_empty() {
            return Err(ConfigError::Missing("api.listen"));
        }
        EnvFilter::try_new(&self.logging.level)
            .map_err(|_| ConfigError::LogLevel(self.logging.level.clone()))?;
        self.batch.validate()
    }
}
