// src/exec/mod.rs

//! Process execution layer.
//!
//! [`command`] provides [`CommandTask`], the production [`crate::chain::TaskRunner`]:
//! it runs a shell command through `tokio::process::Command`, captures its
//! output to a per-task log file and reports pid, exit status and errors
//! back to the chain runner.

pub mod command;

pub use command::CommandTask;
