// src/report/reporter.rs

//! Suite-wide progress accounting and output.
//!
//! One [`Reporter`] is shared by every worker. All mutation goes through a
//! single mutex, so counter updates and the lines they print never
//! interleave between workers.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeDelta};
use tracing::{debug, warn};

use crate::chain::{Chain, RunObserver, Task};
use crate::chain::task::task_label;
use crate::errors::{Result, SuiteError};
use crate::report::format;
use crate::types::{OutputMode, TaskState};

/// Live task counters.
///
/// `total` counts every task that reached a terminal state or is running,
/// skipped ones included, so once a run has drained
/// `passed + failed + skipped == total` and `active == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub active: usize,
}

/// Final result of a run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub counts: Counts,
    /// `"<chain> <task>"` for every failed task, in completion order.
    pub failed_tasks: Vec<String>,
    /// `"<chain> <task>"` for every skipped task, in completion order.
    pub skipped_tasks: Vec<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.counts.failed == 0 && self.counts.skipped == 0
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Append-only report file, written block by block as chains finish.
pub struct ReportSink {
    path: PathBuf,
    writer: Box<dyn Write + Send>,
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSink").field("path", &self.path).finish_non_exhaustive()
    }
}

impl ReportSink {
    /// Create the report file, replacing any existing one.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sink_err = |source: io::Error| SuiteError::ReportSink {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(sink_err)?;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(?path, "replaced existing report file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(sink_err(e)),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(sink_err)?;
        Ok(Self::from_writer(path, Box::new(file)))
    }

    /// Sink backed by an arbitrary writer. `path` is only used in errors.
    pub fn from_writer(path: impl Into<PathBuf>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            path: path.into(),
            writer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()
    }
}

/// `path` if nothing exists there yet, otherwise the first free
/// `<stem>-N.<ext>` next to it.
pub fn unique_report_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| path.with_file_name(format!("{stem}-{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// How the reporter talks to the user.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub mode: OutputMode,
    pub workers: usize,
    /// Colour the live output.
    pub color: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Normal,
            workers: 1,
            color: false,
        }
    }
}

struct ReportState {
    counts: Counts,
    failed_tasks: Vec<String>,
    skipped_tasks: Vec<String>,
    started_at: DateTime<Local>,
    live: Box<dyn Write + Send>,
    sink: Option<ReportSink>,
    sink_error: Option<SuiteError>,
}

pub struct Reporter {
    options: ReportOptions,
    state: Mutex<ReportState>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("options", &self.options)
            .field("counts", &self.counts())
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(options: ReportOptions, live: Box<dyn Write + Send>, sink: Option<ReportSink>) -> Self {
        Self {
            options,
            state: Mutex::new(ReportState {
                counts: Counts::default(),
                failed_tasks: Vec::new(),
                skipped_tasks: Vec::new(),
                started_at: Local::now(),
                live,
                sink,
                sink_error: None,
            }),
        }
    }

    /// Reporter writing live output to stdout.
    pub fn stdout(options: ReportOptions, sink: Option<ReportSink>) -> Self {
        Self::new(options, Box::new(io::stdout()), sink)
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    pub fn counts(&self) -> Counts {
        self.lock().counts
    }

    /// Restart the clock and write the report header for `chains`.
    pub fn begin(&self, chains: &[Chain]) -> Result<()> {
        let mut state = self.lock();
        state.started_at = Local::now();

        let header = format::header_block(chains.iter().map(|c| c.key.as_str()), self.options.workers);
        if let Some(sink) = state.sink.as_mut() {
            if let Err(source) = sink.append(&header) {
                return Err(SuiteError::ReportSink {
                    path: sink.path.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Append the detailed block for a finished chain to the report file.
    ///
    /// On a write failure the sink is closed, the error is kept for
    /// [`Reporter::take_sink_error`], and an error is returned so the caller
    /// can stop handing out work.
    pub fn chain_completed(&self, chain: &Chain) -> Result<()> {
        let mut state = self.lock();
        let Some(sink) = state.sink.as_mut() else {
            return Ok(());
        };

        let block = format::chain_block(chain, false);
        match sink.append(&block) {
            Ok(()) => Ok(()),
            Err(source) => {
                let path = sink.path.clone();
                let returned = SuiteError::ReportSink {
                    path: path.clone(),
                    source: io::Error::new(source.kind(), source.to_string()),
                };
                state.sink = None;
                if state.sink_error.is_none() {
                    state.sink_error = Some(SuiteError::ReportSink { path, source });
                }
                Err(returned)
            }
        }
    }

    /// The first report-file failure seen during the run, if any.
    pub fn take_sink_error(&self) -> Option<SuiteError> {
        self.lock().sink_error.take()
    }

    /// Print the detailed block of every chain to the live output.
    pub fn write_details(&self, chains: &[Chain]) {
        let mut state = self.lock();
        for chain in chains {
            let block = format::chain_block(chain, self.options.color);
            write_live(&mut state, &block);
        }
    }

    /// Stop the clock and produce the summary.
    ///
    /// The summary is appended to the report file and, unless the output
    /// mode is quiet, printed to the live output.
    pub fn finalize(&self) -> Result<Summary> {
        let mut state = self.lock();
        if state.counts.active != 0 {
            warn!(active = state.counts.active, "finalizing with tasks still running");
        }

        let summary = Summary {
            counts: state.counts,
            failed_tasks: state.failed_tasks.clone(),
            skipped_tasks: state.skipped_tasks.clone(),
            started_at: state.started_at,
            finished_at: Local::now(),
        };

        if let Some(sink) = state.sink.as_mut() {
            if let Err(source) = sink.append(&format::summary_block(&summary, false)) {
                return Err(SuiteError::ReportSink {
                    path: sink.path.clone(),
                    source,
                });
            }
        }
        if self.options.mode != OutputMode::Quiet {
            let block = format::summary_block(&summary, self.options.color);
            write_live(&mut state, &block);
        }

        Ok(summary)
    }

    /// One live line. Verbose lines end with the wall-clock time of the
    /// event.
    fn status_line(&self, counts: &Counts, label: &str, status: &str, at: Option<DateTime<Local>>) -> String {
        let verbose = self.options.mode == OutputMode::Verbose;
        let prefix = format::counts_prefix(counts, verbose);
        if verbose {
            let at = format::format_time(Some(at.unwrap_or_else(Local::now)));
            format!("{prefix} {label} {status} at {at}\n")
        } else {
            format!("{prefix} {label} {status}\n")
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_live(state: &mut ReportState, text: &str) {
    if let Err(e) = state
        .live
        .write_all(text.as_bytes())
        .and_then(|()| state.live.flush())
    {
        warn!(error = %e, "could not write live output");
    }
}

impl RunObserver for Reporter {
    fn task_started(&self, chain: &str, task: &Task) {
        let mut state = self.lock();
        state.counts.total += 1;
        state.counts.active += 1;

        if self.options.mode == OutputMode::Verbose {
            let line = self.status_line(&state.counts, &task_label(chain, task), "STARTED", task.started_at);
            write_live(&mut state, &line);
        }
    }

    fn task_skipped(&self, chain: &str, task: &Task) {
        let mut state = self.lock();
        state.counts.total += 1;
        state.counts.skipped += 1;
        let label = task_label(chain, task);
        state.skipped_tasks.push(label.clone());

        if self.options.mode != OutputMode::Quiet {
            let status = format::red("SKIPPED", self.options.color);
            let line = self.status_line(&state.counts, &label, &status, None);
            write_live(&mut state, &line);
        }
    }

    fn task_completed(&self, chain: &str, task: &Task) {
        let mut state = self.lock();
        state.counts.active = state.counts.active.saturating_sub(1);
        let label = task_label(chain, task);
        let passed = task.state == TaskState::Passed;

        if passed {
            state.counts.passed += 1;
        } else {
            state.counts.failed += 1;
            state.failed_tasks.push(label.clone());
        }

        if self.options.mode == OutputMode::Quiet {
            return;
        }
        let mut status = if passed {
            format::green("PASSED", self.options.color)
        } else {
            format::red("FAILED", self.options.color)
        };
        if self.options.mode == OutputMode::Verbose {
            let pid = task.pid.map(|p| p.to_string()).unwrap_or_else(|| "n/a".into());
            let took = task
                .elapsed()
                .map(format::format_duration)
                .unwrap_or_else(|| "n/a".into());
            status.push_str(&format!(" (pid {pid}, {took})"));
        }
        let mut text = self.status_line(&state.counts, &label, &status, task.finished_at);
        if !passed {
            text.push_str(&format::task_block(chain, task, self.options.color));
        }
        write_live(&mut state, &text);
    }
}
