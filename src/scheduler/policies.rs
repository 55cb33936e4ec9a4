//! Persistence Failure Policy
//!
//! Decides what the scheduler does when its sink fails. The default drops
//! the failed block and moves the chain on, so the worker never stalls
//! behind a broken disk. A positive retry count trades latency for
//! durability: the worker stops taking input while it retries.

use crate::config::BatchConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl PersistPolicy {
    /// Give up after the first failure
    pub const fn drop_on_error() -> Self {
        Self {
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    pub const fn retry(retries: u32, retry_delay: Duration) -> Self {
        Self {
            retries,
            retry_delay,
        }
    }

    /// Total number of sink calls allowed for one flush
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self::drop_on_error()
    }
}

impl From<&BatchConfig> for PersistPolicy {
    fn from(config: &BatchConfig) -> Self {
        Self::retry(config.persist_retries, config.retry_delay())
    }
}
