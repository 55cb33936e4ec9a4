//! Block Sink Module
//!
//! Appends blocks to a newline-delimited JSON file, one block per line.
//! The file is only ever appended to; nothing here reads it back, rewrites
//! it or truncates it.

use crate::{Block, error::PersistError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Result of a successful call to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The block had no transactions; nothing was written
    Empty,
    /// The block was appended as one line
    Written { transactions: usize, bytes: usize },
}

/// Destination for flushed blocks
///
/// The scheduler owns its sink and awaits it from its single worker, so
/// implementations need no internal synchronisation and never see two
/// calls at once.
#[async_trait]
pub trait BlockSink: Send + 'static {
    async fn persist(&mut self, block: &Block) -> Result<PersistOutcome, PersistError>;
}

/// Sink appending to a file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlockSink for FileSink {
    async fn persist(&mut self, block: &Block) -> Result<PersistOutcome, PersistError> {
        persist(block, &self.path).await
    }
}

/// Append `block` to the file at `path` as one JSON line
///
/// Empty blocks are skipped without touching the file. The file is created
/// if it does not exist. The line is assembled in memory and written with
/// one `write_all` followed by a flush, so the call returns only once the
/// whole line reached the file. The blocking work runs on tokio's blocking
/// pool, not on the caller's runtime thread. No fsync is issued.
///
/// # Returns
/// * `Ok(PersistOutcome::Empty)` if the block had no transactions
/// * `Ok(PersistOutcome::Written { .. })` once the line is written
/// * `Err(PersistError)` on serialization or I/O failure
pub async fn persist(block: &Block, path: &Path) -> Result<PersistOutcome, PersistError> {
    if block.is_empty() {
        return Ok(PersistOutcome::Empty);
    }

    let mut line = serde_json::to_vec(block)?;
    line.push(b'\n');

    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;
    file.write_all(&line).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;

    Ok(PersistOutcome::Written {
        transactions: block.len(),
        bytes: line.len(),
    })
}
