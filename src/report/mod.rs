// src/report/mod.rs

//! Progress counters, live output and the persistent report file.

pub mod format;
pub mod reporter;

pub use reporter::{unique_report_path, Counts, ReportOptions, ReportSink, Reporter, Summary};
