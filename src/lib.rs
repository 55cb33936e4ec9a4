//! This crate simulates a block-producing ledger: key/value transactions
//! submitted over HTTP are grouped into chain-linked blocks, and each block
//! is appended to a file when it fills up or when the flush period elapses.

pub mod types; // Transactions, blocks and receipts.
pub mod api; // HTTP endpoint for submitting transactions.
pub mod validation; // Checks caller input before it becomes a transaction.
pub mod scheduler; // The batching actor deciding when blocks are flushed.
pub mod batch; // Writing flushed blocks to disk.
pub mod config; // Defines and loads system configuration.
pub mod error; // Error types shared across modules.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use scheduler::{Scheduler, SchedulerHandle};
