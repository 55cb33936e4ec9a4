//! Block Persistence Module
//!
//! This module handles what happens to a block once it is flushed:
//! - Sink: appends a block to the output file as one JSON line
//! - Trigger: names the event that caused a flush

mod sink;
mod trigger;

pub use sink::{BlockSink, FileSink, PersistOutcome, persist};
pub use trigger::FlushTrigger;
