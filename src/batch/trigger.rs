//! Flush Trigger Module
//!
//! Names the event that caused the scheduler to flush its current block.
//! The scheduler services exactly one of these at a time.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The block reached the configured maximum number of transactions
    BlockFull,
    /// The flush period elapsed
    Timer,
    /// The scheduler is shutting down
    Shutdown,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::BlockFull => "block_full",
            FlushTrigger::Timer => "timer",
            FlushTrigger::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
