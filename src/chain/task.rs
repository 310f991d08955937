// src/chain/task.rs

//! Tasks, the runnable contract behind them, and the chains that own them.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::{DateTime, Local, TimeDelta};

use crate::errors::Result;
use crate::types::{ChainKey, TaskState, UNSEEN_RANK};

/// What a runner reports back after one execution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRun {
    pub passed: bool,
    pub pid: Option<u32>,
    pub log_path: Option<PathBuf>,
    pub command_line: Option<String>,
    pub error_messages: Vec<String>,
}

impl TaskRun {
    pub fn passed() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            error_messages: vec![message.into()],
            ..Self::default()
        }
    }
}

/// Contract for the opaque execution handle behind a [`Task`].
///
/// The scheduler never looks inside a runner: it calls [`TaskRunner::run`]
/// once and trusts the returned [`TaskRun`]. An `Err` (or a panic inside the
/// future) is recorded as a failed task, never as a scheduler error.
///
/// Production code uses [`crate::exec::CommandTask`]; tests provide scripted
/// runners that never spawn processes.
pub trait TaskRunner: Send {
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<TaskRun>> + Send + '_>>;
}

/// One runnable step inside a [`Chain`].
pub struct Task {
    pub description: String,
    pub state: TaskState,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    pub pid: Option<u32>,
    pub log_path: Option<PathBuf>,
    pub command_line: Option<String>,
    pub error_messages: Vec<String>,
    runner: Option<Box<dyn TaskRunner>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("description", &self.description)
            .field("state", &self.state)
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .field("pid", &self.pid)
            .field("log_path", &self.log_path)
            .field("error_messages", &self.error_messages)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(description: impl Into<String>, runner: Box<dyn TaskRunner>) -> Self {
        Self {
            description: description.into(),
            state: TaskState::Pending,
            started_at: None,
            finished_at: None,
            pid: None,
            log_path: None,
            command_line: None,
            error_messages: Vec::new(),
            runner: Some(runner),
        }
    }

    /// Wall-clock time the task spent running, if it ran.
    pub fn elapsed(&self) -> Option<TimeDelta> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub(crate) fn take_runner(&mut self) -> Option<Box<dyn TaskRunner>> {
        self.runner.take()
    }

    pub(crate) fn restore_runner(&mut self, runner: Box<dyn TaskRunner>) {
        self.runner = Some(runner);
    }

    pub(crate) fn apply_run(&mut self, run: TaskRun) {
        self.pid = run.pid.or(self.pid);
        self.log_path = run.log_path.or(self.log_path.take());
        self.command_line = run.command_line.or(self.command_line.take());
        self.error_messages.extend(run.error_messages);
    }
}

/// An independently schedulable, ordered sequence of tasks.
#[derive(Debug)]
pub struct Chain {
    pub key: ChainKey,
    /// Lower runs sooner. Set by the priority ledger before scheduling.
    pub rank: u64,
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub tasks: Vec<Task>,
}

impl Chain {
    pub fn new(key: impl Into<ChainKey>) -> Self {
        Self {
            key: key.into(),
            rank: UNSEEN_RANK,
            source_dir: None,
            output_dir: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_dirs(mut self, source_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        self.source_dir = source_dir;
        self.output_dir = output_dir;
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn push_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Aggregate outcome: a chain failed iff any of its tasks failed.
    pub fn failed(&self) -> bool {
        self.tasks.iter().any(|t| t.state == TaskState::Failed)
    }

    /// Sum of the elapsed time of every task that actually ran.
    pub fn total_elapsed(&self) -> TimeDelta {
        self.tasks
            .iter()
            .filter_map(Task::elapsed)
            .fold(TimeDelta::zero(), |acc, d| acc + d)
    }
}

/// Identifier used in live output and in the failed/skipped lists.
pub(crate) fn task_label(key: &str, task: &Task) -> String {
    format!("{key} {}", task.description)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl TaskRunner for Noop {
        fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<TaskRun>> + Send + '_>> {
            Box::pin(async { Ok(TaskRun::passed()) })
        }
    }

    #[test]
    fn new_chain_is_unseen_and_pending() {
        let chain = Chain::new("keck/1200G").with_task(Task::new("reduce", Box::new(Noop)));
        assert_eq!(chain.rank, UNSEEN_RANK);
        assert_eq!(chain.tasks[0].state, TaskState::Pending);
        assert!(!chain.failed());
        assert_eq!(task_label(&chain.key, &chain.tasks[0]), "keck/1200G reduce");
    }

    #[test]
    fn total_elapsed_ignores_tasks_that_never_ran() {
        let start = Local::now();
        let mut ran = Task::new("ran", Box::new(Noop));
        ran.started_at = Some(start);
        ran.finished_at = Some(start + TimeDelta::seconds(7));
        let skipped = Task::new("skipped", Box::new(Noop));

        let chain = Chain::new("k").with_task(ran).with_task(skipped);
        assert_eq!(chain.total_elapsed(), TimeDelta::seconds(7));
    }

    #[test]
    fn apply_run_keeps_existing_metadata_when_run_has_none() {
        let mut task = Task::new("t", Box::new(Noop));
        task.pid = Some(42);
        task.apply_run(TaskRun::failed("boom"));
        assert_eq!(task.pid, Some(42));
        assert_eq!(task.error_messages, vec!["boom".to_string()]);
    }
}
