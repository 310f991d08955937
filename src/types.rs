use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical chain key type used throughout the crate.
pub type ChainKey = String;

/// Rank handed to chains the priority ledger has never seen.
///
/// Known chains always sort ahead of it; ties between unseen chains fall back
/// to submission order.
pub const UNSEEN_RANK: u64 = u64::MAX;

/// Result state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Not yet attempted.
    Pending,
    /// Handed to its runner and not yet finished.
    Running,
    Passed,
    Failed,
    /// Never attempted because an earlier task in the same chain failed.
    Skipped,
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Pending
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Passed => "PASSED",
            TaskState::Failed => "FAILED",
            TaskState::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// How much the reporter echoes to the live output while a suite runs.
///
/// - `Quiet`: nothing on stdout; results only go to the report file.
/// - `Normal`: one line per task event plus failure details and the summary.
/// - `Verbose`: as `Normal`, with active counts, timestamps, pids and
///   durations, plus a detailed per-chain report at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Quiet,
    Normal,
    Verbose,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Normal
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiet" => Ok(OutputMode::Quiet),
            "normal" => Ok(OutputMode::Normal),
            "verbose" => Ok(OutputMode::Verbose),
            other => Err(format!(
                "invalid output mode: {other} (expected \"quiet\", \"normal\" or \"verbose\")"
            )),
        }
    }
}
