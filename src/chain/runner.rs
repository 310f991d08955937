// src/chain/runner.rs

//! Sequential, skip-on-failure execution of one chain.
//!
//! Tasks run strictly in order. The first failed task stops forward
//! progress: every later task goes straight from `Pending` to `Skipped` and
//! is never handed to its runner.

use chrono::Local;
use tracing::{debug, warn};

use crate::chain::task::{Chain, Task};
use crate::types::TaskState;

/// Receives task lifecycle events from the chain runner.
///
/// The [`crate::report::Reporter`] is the production observer; workers on
/// different threads share one observer, so implementations must do their
/// own synchronisation.
pub trait RunObserver: Send + Sync {
    fn task_started(&self, chain: &str, task: &Task);
    fn task_skipped(&self, chain: &str, task: &Task);
    fn task_completed(&self, chain: &str, task: &Task);
}

/// Run every task of `chain` in order, emitting events to `observer`.
///
/// Returns `true` if all tasks passed.
pub async fn run_chain(chain: &mut Chain, observer: &dyn RunObserver) -> bool {
    let key = chain.key.clone();
    let mut failed = false;

    for task in chain.tasks.iter_mut() {
        if task.state != TaskState::Pending {
            warn!(chain = %key, task = %task.description, state = %task.state, "task is not pending; leaving it alone");
            failed |= task.state == TaskState::Failed;
            continue;
        }

        if failed {
            task.state = TaskState::Skipped;
            observer.task_skipped(&key, task);
            continue;
        }

        task.state = TaskState::Running;
        task.started_at = Some(Local::now());
        observer.task_started(&key, task);

        let passed = execute_task(&key, task).await;

        task.finished_at = Some(Local::now());
        task.state = if passed {
            TaskState::Passed
        } else {
            TaskState::Failed
        };
        observer.task_completed(&key, task);

        if !passed {
            debug!(chain = %key, task = %task.description, "task failed; skipping the rest of the chain");
            failed = true;
        }
    }

    !failed
}

/// Hand the task to its runner on a separate Tokio task so that a panic
/// inside the runner is contained and reported as a failure.
async fn execute_task(key: &str, task: &mut Task) -> bool {
    let Some(mut runner) = task.take_runner() else {
        task.error_messages
            .push("task has no runner (was it already executed?)".to_string());
        return false;
    };

    let handle = tokio::spawn(async move {
        let result = runner.run().await;
        (runner, result)
    });

    match handle.await {
        Ok((runner, Ok(run))) => {
            task.restore_runner(runner);
            let passed = run.passed;
            task.apply_run(run);
            passed
        }
        Ok((runner, Err(err))) => {
            task.restore_runner(runner);
            warn!(chain = %key, task = %task.description, error = %err, "task runner returned an error");
            task.error_messages.push(format!("{err:#}"));
            false
        }
        Err(join_err) => {
            warn!(chain = %key, task = %task.description, error = %join_err, "task runner aborted");
            let message = if join_err.is_panic() {
                "task panicked while running".to_string()
            } else {
                format!("task was cancelled: {join_err}")
            };
            task.error_messages.push(message);
            false
        }
    }
}
