// src/engine/mod.rs

//! Suite orchestration.
//!
//! [`Orchestrator::run`] is the core entry point. It ties together:
//! - the priority ledger (rank assignment before, recompute after)
//! - the scheduler queue and worker pool
//! - the reporter and its optional report file
//!
//! It knows nothing about where chains come from; the chain builder and the
//! CLI live outside this module.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorOptions, SuiteOutcome};
