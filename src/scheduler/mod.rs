//! Block Scheduling Module
//!
//! This module runs the batching actor:
//! - Scheduler: owns the current block, reacts to input, timer and shutdown
//! - Policies: what to do when persisting a block fails
//!
//! Producers talk to the actor through [`BlockInput`]; the owner stops it
//! through [`SchedulerHandle::close`].

mod policies;
mod scheduler;


pub use policies::PersistPolicy;
pub use scheduler::{BlockInput, FlushStats, Scheduler, SchedulerHandle, SchedulerSettings};
