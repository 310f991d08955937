// src/report/format.rs

//! Text rendering for live output and report files.
//!
//! Everything here is a pure function returning a `String`; the reporter
//! decides where (and under which lock) the text goes. Live output is
//! coloured, report files are not.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local, TimeDelta};

use crate::chain::{Chain, Task};
use crate::report::reporter::{Counts, Summary};
use crate::types::TaskState;

/// Number of log lines shown under a failed task.
pub const LOG_TAIL_LINES: usize = 3;

pub fn red(text: &str, color: bool) -> String {
    if color {
        format!("\x1B[1;31m{text}\x1B[0m")
    } else {
        text.to_string()
    }
}

pub fn green(text: &str, color: bool) -> String {
    if color {
        format!("\x1B[1;32m{text}\x1B[0m")
    } else {
        text.to_string()
    }
}

/// `H:MM:SS.mmm`
pub fn format_duration(d: TimeDelta) -> String {
    let millis = d.num_milliseconds().max(0);
    let secs = millis / 1000;
    format!(
        "{}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis % 1000
    )
}

/// Wall-clock time in `ctime` layout, e.g. `Tue Mar  5 14:07:09 2024`.
pub fn format_time(t: Option<DateTime<Local>>) -> String {
    match t {
        Some(t) => t.format("%a %b %e %H:%M:%S %Y").to_string(),
        None => "n/a".to_string(),
    }
}

/// Counter prefix for live status lines, e.g. ` 3 passed/ 1 failed/ 0 skipped`.
pub fn counts_prefix(counts: &Counts, verbose: bool) -> String {
    let active = if verbose {
        format!("{:2} active/", counts.active)
    } else {
        String::new()
    };
    format!(
        "{active}{:2} passed/{:2} failed/{:2} skipped",
        counts.passed, counts.failed, counts.skipped
    )
}

/// Last `n` lines of a log file, or `None` if it cannot be read.
pub fn tail_lines(path: &Path, n: usize) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    Some(lines[start..].join("\n"))
}

/// Detailed block for one task: result, log, pid, timing, command, errors
/// and the tail of its log.
pub fn task_block(chain_key: &str, task: &Task, color: bool) -> String {
    let result = match task.state {
        TaskState::Passed => green("--- PASSED", color),
        TaskState::Skipped => red("--- SKIPPED", color),
        TaskState::Failed => red("--- FAILED", color),
        TaskState::Pending | TaskState::Running => format!("--- {}", task.state),
    };
    let duration = task
        .elapsed()
        .map(format_duration)
        .unwrap_or_else(|| "n/a".to_string());
    let log = task
        .log_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let pid = task
        .pid
        .map(|p| p.to_string())
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "----");
    let _ = writeln!(out, "{chain_key} {} Result: {result}\n", task.description);
    let _ = writeln!(out, "Logfile:    {log}");
    let _ = writeln!(out, "Process Id: {pid}");
    let _ = writeln!(out, "Start time: {}", format_time(task.started_at));
    let _ = writeln!(out, "End time:   {}", format_time(task.finished_at));
    let _ = writeln!(out, "Duration:   {duration}");
    let _ = writeln!(
        out,
        "Command:    {}",
        task.command_line.as_deref().unwrap_or("")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Error Messages:");
    for msg in &task.error_messages {
        let _ = writeln!(out, "{msg}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "End of Log:");
    if let Some(tail) = task
        .log_path
        .as_deref()
        .and_then(|p| tail_lines(p, LOG_TAIL_LINES))
    {
        let _ = writeln!(out, "{tail}");
    }
    let _ = writeln!(out);
    out
}

/// Detailed block for a finished chain: directories and every task.
pub fn chain_block(chain: &Chain, color: bool) -> String {
    let dir = |d: &Option<std::path::PathBuf>| {
        d.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "n/a".to_string())
    };

    let mut out = String::new();
    let _ = writeln!(out, "-------------------------");
    let _ = writeln!(out, "Chain: {}\n", chain.key);
    let _ = writeln!(out, "-------------------------");
    let _ = writeln!(out, "Directories:");
    let _ = writeln!(out, "    Source: {}", dir(&chain.source_dir));
    let _ = writeln!(out, "    Output: {}", dir(&chain.output_dir));
    let _ = writeln!(out, "Tasks:");
    for task in &chain.tasks {
        out.push_str(&task_block(&chain.key, task, color));
    }
    out
}

/// Report file header listing what is about to run.
pub fn header_block<'a>(keys: impl IntoIterator<Item = &'a str>, workers: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ran the following chains:");
    for key in keys {
        let _ = writeln!(out, "    {key}");
    }
    let _ = writeln!(out);
    if workers > 1 {
        let _ = writeln!(out, "Ran tasks in {workers} parallel workers\n");
    }
    out
}

/// Pass/fail banner plus failed and skipped lists.
pub fn banner(summary: &Summary, color: bool) -> String {
    let mut out = String::new();
    if summary.all_passed() {
        let text = format!(
            "--- SUITE PASSED {}/{} TASKS ---",
            summary.counts.passed, summary.counts.total
        );
        let _ = writeln!(out, "{}", green(&text, color));
    } else {
        let text = format!(
            "--- SUITE FAILED {}/{} TASKS ---",
            summary.counts.failed, summary.counts.total
        );
        let _ = writeln!(out, "{}", red(&text, color));
        let _ = writeln!(out, "Failed tasks:");
        for t in &summary.failed_tasks {
            let _ = writeln!(out, "    {t}");
        }
        let _ = writeln!(out, "Skipped tasks:");
        for t in &summary.skipped_tasks {
            let _ = writeln!(out, "    {t}");
        }
    }
    out
}

/// Final summary: banner and timing.
pub fn summary_block(summary: &Summary, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nTest Summary\n--------------------------------------------------------"
    );
    out.push_str(&banner(summary, color));
    let _ = writeln!(out, "Testing Started at {}", summary.started_at.to_rfc3339());
    let _ = writeln!(out, "Testing Completed at {}", summary.finished_at.to_rfc3339());
    let _ = writeln!(out, "Total Time: {}", format_duration(summary.elapsed()));
    out
}
