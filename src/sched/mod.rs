// src/sched/mod.rs

//! Scheduling: who runs next, and on which worker.
//!
//! - [`ledger`] persists chain priorities learned from past durations.
//! - [`queue`] is the rank-ordered, acknowledgment-counting work queue.
//! - [`pool`] runs N workers that drain the queue through the chain runner.

pub mod ledger;
pub mod pool;
pub mod queue;

pub use ledger::PriorityLedger;
pub use pool::{WorkerPool, DEFAULT_POLL_INTERVAL};
pub use queue::{Ranked, SchedulerQueue};
