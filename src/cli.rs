// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::OutputMode;

/// Command-line arguments for `suiterun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "suiterun",
    version,
    about = "Run independent test chains across a pool of parallel workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the suite file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Suiterun.toml")]
    pub config: PathBuf,

    /// Number of parallel workers. Overrides `[suite].workers`.
    #[arg(short = 't', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Only run this chain. May be repeated.
    ///
    /// A filtered run never updates the chain priorities.
    #[arg(short = 'c', long = "chain", value_name = "KEY")]
    pub chains: Vec<String>,

    /// Write a detailed report to this file, replacing it if it exists.
    #[arg(short = 'r', long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Priority ledger location. Overrides `[suite].ledger`.
    #[arg(long, value_name = "PATH")]
    pub ledger: Option<PathBuf>,

    /// Root directory for task logs. Overrides `[suite].output_dir`.
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// No live output; a report file is always written.
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show task starts, pids and durations, plus a full report at the end.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SUITERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build chains and show the schedule, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Output mode requested on the command line, if any.
    pub fn output_mode(&self) -> Option<OutputMode> {
        if self.quiet {
            Some(OutputMode::Quiet)
        } else if self.verbose {
            Some(OutputMode::Verbose)
        } else {
            None
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["suiterun"]).unwrap();
        assert_eq!(args.config, PathBuf::from("Suiterun.toml"));
        assert!(args.chains.is_empty());
        assert_eq!(args.output_mode(), None);
    }

    #[test]
    fn repeated_chain_filters() {
        let args =
            CliArgs::try_parse_from(["suiterun", "-c", "a/1", "--chain", "b/2", "-t", "4", "-v"])
                .unwrap();
        assert_eq!(args.chains, vec!["a/1".to_string(), "b/2".to_string()]);
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.output_mode(), Some(OutputMode::Verbose));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(CliArgs::try_parse_from(["suiterun", "-q", "-v"]).is_err());
    }
}
