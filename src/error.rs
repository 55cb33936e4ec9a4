//! Error Types
//!
//! Every fallible operation in the crate reports one of these. Errors raised
//! inside the scheduler worker are logged there and never leave it; the rest
//! are returned to the caller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems detected before the scheduler starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::config::Config`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is missing or zero
    #[error("{0} must be specified. Check your config file")]
    Missing(&'static str),

    /// The log level cannot be turned into a filter
    #[error("invalid log level '{0}'")]
    LogLevel(String),

    /// The flush file cannot be opened for appending
    #[error("flush file '{path}' is not writable: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to append a block to its target file
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("error while marshalling block data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("error while writing block to '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to hand a transaction to the scheduler
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The scheduler has shut down and no longer accepts input
    #[error("scheduler is closed")]
    Closed,
}

/// Failure while shutting the scheduler down
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler worker terminated abnormally: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Rejected caller input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("key is required")]
    MissingKey,

    #[error("value is required")]
    MissingValue,
}
