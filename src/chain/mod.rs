// src/chain/mod.rs

//! Chains of tasks and their execution.
//!
//! - [`task`] holds the [`Task`]/[`Chain`] data model and the [`TaskRunner`]
//!   contract tasks are executed through.
//! - [`runner`] runs one chain in order with per-chain fail-fast semantics.
//! - [`builder`] turns suite file sections into chains, collecting
//!   missing-precondition diagnostics.

pub mod builder;
pub mod runner;
pub mod task;

pub use builder::ChainBuilder;
pub use runner::{run_chain, RunObserver};
pub use task::{Chain, Task, TaskRun, TaskRunner};
