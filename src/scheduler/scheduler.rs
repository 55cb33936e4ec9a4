//! Block Scheduler Module
//!
//! This module implements the actor that owns the current block and decides
//! when it is flushed. A single tokio task runs the event loop and services
//! one event at a time:
//!
//! 1. **Transaction received**: append to the block; flush immediately once
//!    the block holds `max_block_size` transactions and restart the timer
//! 2. **Timer fired**: flush whatever the block holds and restart the timer
//! 3. **Shutdown requested**: drain accepted input, flush, stop
//!
//! The block is only touched by that task, so it needs no lock. Producers
//! reach it through [`BlockInput`], a channel with room for a single
//! transaction: a producer waits while the worker is busy writing.
//!
//! # Flush outcomes
//! - Block written: the block is recycled as the next link of the chain
//! - Block empty: nothing is written and the chain link is kept
//! - Write failed: the error is logged, the block is dropped and the chain
//!   moves on (after the retries allowed by [`PersistPolicy`])

use crate::{
    Block, Transaction,
    batch::{BlockSink, FileSink, FlushTrigger, PersistOutcome},
    config::BatchConfig,
    error::{ConfigError, SchedulerError, SubmitError},
    scheduler::PersistPolicy,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Number of transactions that may wait between a producer and the worker
const INPUT_CAPACITY: usize = 1;

/// Validated scheduler parameters
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Time between timer-driven flushes
    pub flush_period: Duration,
    /// Number of transactions that forces an immediate flush
    pub max_block_size: usize,
    /// What to do when the sink fails
    pub policy: PersistPolicy,
}

impl SchedulerSettings {
    /// Check that neither trigger is disabled
    ///
    /// Both values must be non-zero.
    pub fn new(flush_period: Duration, max_block_size: usize) -> Result<Self, ConfigError> {
        if flush_period.is_zero() {
            return Err(ConfigError::Missing("batch.flush_period_secs"));
        }
        if max_block_size == 0 {
            return Err(ConfigError::Missing("batch.max_block_size"));
        }
        Ok(Self {
            flush_period,
            max_block_size,
            policy: PersistPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PersistPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl TryFrom<&BatchConfig> for SchedulerSettings {
    type Error = ConfigError;

    fn try_from(config: &BatchConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        Ok(Self::new(config.flush_period(), config.max_block_size)?.with_policy(config.into()))
    }
}

/// Counters reported by the worker when it stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    /// Blocks appended by the sink
    pub blocks_written: u64,
    /// Transactions contained in those blocks
    pub transactions_written: u64,
    /// Flushes that found the block empty
    pub empty_flushes: u64,
    /// Flushes whose block was dropped after the sink failed
    pub failed_flushes: u64,
    /// Transactions contained in dropped blocks
    pub lost_transactions: u64,
}

/// Producer side of the scheduler input
///
/// Cheap to clone; every request handler holds its own copy.
#[derive(Debug, Clone)]
pub struct BlockInput {
    /// Sending half of the worker's input channel
    sender: mpsc::Sender<Transaction>,
}

impl BlockInput {
    /// Hand a transaction to the scheduler
    ///
    /// Waits while the worker is busy. Fails once the scheduler has stopped.
    pub async fn send(&self, tx: Transaction) -> Result<(), SubmitError> {
        self.sender.send(tx).await.map_err(|_| SubmitError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Owner's handle on a running scheduler
///
/// Dropping the handle without calling [`SchedulerHandle::close`] still stops
/// the worker and flushes the block, but nobody waits for it.
#[derive(Debug)]
pub struct SchedulerHandle {
    /// Input kept alive until the worker has stopped
    input: BlockInput,
    /// Fired once by `close`; dropping it also stops the worker
    shutdown: oneshot::Sender<()>,
    /// The worker task, yielding its counters when it ends
    worker: JoinHandle<FlushStats>,
}

impl SchedulerHandle {
    pub fn input(&self) -> BlockInput {
        self.input.clone()
    }

    /// Stop the scheduler and wait for the final flush
    ///
    /// Callers must stop sending before calling this; transactions sent
    /// afterwards are rejected with [`SubmitError::Closed`].
    pub async fn close(self) -> Result<FlushStats, SchedulerError> {
        let SchedulerHandle {
            input,
            shutdown,
            worker,
        } = self;

        // The worker may already be gone if it was aborted; join reports that
        let _ = shutdown.send(());
        let stats = worker.await?;
        drop(input);

        info!(
            blocks = stats.blocks_written,
            transactions = stats.transactions_written,
            failed = stats.failed_flushes,
            "Scheduler stopped"
        );
        Ok(stats)
    }
}

/// The batching actor
///
/// Owns the live block and the sink. Constructed and moved into its worker
/// task by [`Scheduler::start`] or [`Scheduler::spawn`]; callers only ever
/// see the [`SchedulerHandle`].
pub struct Scheduler<S> {
    /// The live block; recycled in place after every non-empty flush
    block: Block,
    /// Destination for flushed blocks
    sink: S,
    /// Flush period, size limit and failure policy
    settings: SchedulerSettings,
    /// Counters returned from `close`
    stats: FlushStats,
}

impl Scheduler<FileSink> {
    /// Start a scheduler appending to `config.flush_file`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &BatchConfig) -> Result<SchedulerHandle, ConfigError> {
        let settings = SchedulerSettings::try_from(config)?;
        Ok(Scheduler::spawn(settings, FileSink::new(&config.flush_file)))
    }
}

impl<S: BlockSink> Scheduler<S> {
    /// Start a scheduler writing to an arbitrary sink
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(settings: SchedulerSettings, sink: S) -> SchedulerHandle {
        let (sender, receiver) = mpsc::channel(INPUT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let scheduler = Scheduler {
            block: Block::new(""),
            sink,
            settings,
            stats: FlushStats::default(),
        };
        let worker = tokio::spawn(scheduler.run(receiver, shutdown_rx));

        SchedulerHandle {
            input: BlockInput { sender },
            shutdown: shutdown_tx,
            worker,
        }
    }

    async fn run(
        mut self,
        mut input: mpsc::Receiver<Transaction>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> FlushStats {
        let period = self.settings.flush_period;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            flush_period_secs = period.as_secs(),
            max_block_size = self.settings.max_block_size,
            retries = self.settings.policy.retries,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                // A dropped handle counts as a shutdown request
                _ = &mut shutdown => break,

                received = input.recv() => {
                    let Some(tx) = received else { break };
                    if self.accept(tx) {
                        info!(
                            max_block_size = self.settings.max_block_size,
                            "Number of transactions reached maximum, flushing"
                        );
                        self.flush(FlushTrigger::BlockFull).await;
                        ticker.reset();
                    }
                }

                _ = ticker.tick() => {
                    debug!("Flush timer fired");
                    self.flush(FlushTrigger::Timer).await;
                    ticker.reset();
                }
            }
        }

        info!("Stopping scheduler");

        // Anything a producer managed to send before the channel closed
        // still belongs to this chain
        input.close();
        while let Ok(tx) = input.try_recv() {
            if self.accept(tx) {
                self.flush(FlushTrigger::BlockFull).await;
            }
        }
        self.flush(FlushTrigger::Shutdown).await;

        self.stats
    }

    /// Append a transaction; returns true once the block is full
    fn accept(&mut self, tx: Transaction) -> bool {
        debug!(id = %tx.id, key = %tx.key, "Scheduler got new transaction");
        self.block.append(tx);
        self.block.len() >= self.settings.max_block_size
    }

    async fn flush(&mut self, trigger: FlushTrigger) {
        let attempts = self.settings.policy.attempts();
        let mut attempt = 1;

        let result = loop {
            match self.sink.persist(&self.block).await {
                Err(e) if attempt < attempts => {
                    warn!(%trigger, attempt, error = %e, "Block persist failed, retrying");
                    attempt += 1;
                    time::sleep(self.settings.policy.retry_delay).await;
                }
                result => break result,
            }
        };

        match result {
            Ok(PersistOutcome::Written { transactions, bytes }) => {
                info!(
                    %trigger,
                    block_hash = %self.block.hash,
                    prev_block_hash = %self.block.prev_hash,
                    transactions,
                    bytes,
                    "Block flushed"
                );
                self.stats.blocks_written += 1;
                self.stats.transactions_written += transactions as u64;
                self.block.advance();
            }
            Ok(PersistOutcome::Empty) => {
                warn!(%trigger, "No transactions in block, nothing written");
                self.stats.empty_flushes += 1;
            }
            Err(e) => {
                let lost = self.block.len();
                error!(
                    %trigger,
                    block_hash = %self.block.hash,
                    lost_transactions = lost,
                    error = %e,
                    "Block flush failed, dropping block"
                );
                self.stats.failed_flushes += 1;
                self.stats.lost_transactions += lost as u64;
                self.block.advance();
            }
        }
    }
}
