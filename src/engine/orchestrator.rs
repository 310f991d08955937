// src/engine/orchestrator.rs

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chain::Chain;
use crate::errors::{Result, SuiteError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::{ReportOptions, ReportSink, Reporter, Summary};
use crate::sched::{PriorityLedger, SchedulerQueue, WorkerPool, DEFAULT_POLL_INTERVAL};
use crate::types::OutputMode;

/// Knobs for one suite run.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub workers: usize,
    pub ledger_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub output: OutputMode,
    pub color: bool,
    /// Every chain of the suite is part of this run. Priorities are only
    /// learned from full runs.
    pub full_suite: bool,
    pub poll_interval: Duration,
}

impl OrchestratorOptions {
    pub fn new(workers: usize, ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            workers,
            ledger_path: ledger_path.into(),
            report_path: None,
            output: OutputMode::Normal,
            color: false,
            full_suite: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct SuiteOutcome {
    pub summary: Summary,
    /// Every chain, in the order it was submitted.
    pub chains: Vec<Chain>,
    /// The priority ledger was rewritten.
    pub priorities_written: bool,
}

pub struct Orchestrator {
    options: OrchestratorOptions,
    fs: Arc<dyn FileSystem>,
    live: Option<Box<dyn Write + Send>>,
    sink: Option<ReportSink>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        Self {
            options,
            fs: Arc::new(RealFileSystem),
            live: None,
            sink: None,
        }
    }

    /// Use a different filesystem for the priority ledger.
    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Send live output somewhere other than stdout.
    pub fn with_live_output(mut self, live: Box<dyn Write + Send>) -> Self {
        self.live = Some(live);
        self
    }

    /// Write the report to `sink` instead of opening `report_path`.
    pub fn with_report_sink(mut self, sink: ReportSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run `chains` to completion.
    ///
    /// Fails before any task runs if the worker count is zero or the report
    /// file cannot be opened. A report file that fails mid-run stops further
    /// chains from starting; chains already running finish, then the error
    /// is returned.
    pub async fn run(self, mut chains: Vec<Chain>) -> Result<SuiteOutcome> {
        let opts = self.options;
        if opts.workers == 0 {
            return Err(SuiteError::ConfigError(
                "worker count must be at least 1".to_string(),
            ));
        }

        let mut ledger = PriorityLedger::load(self.fs.as_ref(), &opts.ledger_path);
        let sink = match self.sink {
            Some(sink) => Some(sink),
            None => opts.report_path.as_ref().map(ReportSink::create).transpose()?,
        };

        let report_options = ReportOptions {
            mode: opts.output,
            workers: opts.workers,
            color: opts.color,
        };
        let reporter = Arc::new(match self.live {
            Some(live) => Reporter::new(report_options, live, sink),
            None => Reporter::stdout(report_options, sink),
        });

        for chain in chains.iter_mut() {
            ledger.assign(chain);
        }
        reporter.begin(&chains)?;

        let submitted: HashMap<String, usize> = chains
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key.clone(), i))
            .collect();

        let (runnable, mut finished): (Vec<Chain>, Vec<Chain>) =
            chains.into_iter().partition(|c| !c.tasks.is_empty());
        for chain in &finished {
            debug!(chain = %chain.key, "chain has no tasks; not queueing it");
        }

        if !runnable.is_empty() {
            let queue = Arc::new(SchedulerQueue::new());
            info!(
                chains = runnable.len(),
                workers = opts.workers,
                known = ledger.len(),
                "scheduling chains"
            );
            for chain in runnable {
                queue.push(chain);
            }

            let pool = WorkerPool::start(
                opts.workers,
                Arc::clone(&queue),
                Arc::clone(&reporter),
                opts.poll_interval,
            );
            queue.drain().await;
            debug!("queue drained; stopping workers");
            finished.extend(pool.join().await?);
        }

        finished.sort_by_key(|c| submitted.get(&c.key).copied().unwrap_or(usize::MAX));

        if let Some(err) = reporter.take_sink_error() {
            return Err(err);
        }
        if opts.output == OutputMode::Verbose {
            reporter.write_details(&finished);
        }
        let summary = reporter.finalize()?;

        let mut priorities_written = false;
        if opts.full_suite && summary.all_passed() {
            ledger.recompute(&finished);
            match ledger.persist(self.fs.as_ref()) {
                Ok(written) => priorities_written = written,
                Err(e) => warn!(path = ?ledger.path(), error = %e, "could not write priority ledger"),
            }
        } else {
            debug!(
                full_suite = opts.full_suite,
                all_passed = summary.all_passed(),
                "keeping previous chain priorities"
            );
        }

        Ok(SuiteOutcome {
            summary,
            chains: finished,
            priorities_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::chain::{Task, TaskRun, TaskRunner};
    use crate::fs::mock::MockFileSystem;
    use crate::types::TaskState;

    struct Outcome(bool);

    impl TaskRunner for Outcome {
        fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<TaskRun>> + Send + '_>> {
            let passed = self.0;
            Box::pin(async move {
                Ok(if passed {
                    TaskRun::passed()
                } else {
                    TaskRun::failed("scripted failure")
                })
            })
        }
    }

    fn chain(key: &str, outcomes: &[bool]) -> Chain {
        let mut c = Chain::new(key);
        for (i, ok) in outcomes.iter().enumerate() {
            c.push_task(Task::new(format!("t{i}"), Box::new(Outcome(*ok))));
        }
        c
    }

    fn options() -> OrchestratorOptions {
        let mut o = OrchestratorOptions::new(2, "/ledger");
        o.output = OutputMode::Quiet;
        o.poll_interval = Duration::from_millis(20);
        o
    }

    fn orchestrator(opts: OrchestratorOptions, fs: &MockFileSystem) -> Orchestrator {
        Orchestrator::new(opts)
            .with_fs(Arc::new(fs.clone()))
            .with_live_output(Box::new(std::io::sink()))
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let fs = MockFileSystem::new();
        let mut opts = options();
        opts.workers = 0;
        let err = orchestrator(opts, &fs)
            .run(vec![chain("a", &[true])])
            .await
            .unwrap_err();
        assert!(matches!(err, SuiteError::ConfigError(_)));
    }

    #[tokio::test]
    async fn chains_come_back_in_submission_order() {
        let fs = MockFileSystem::new();
        let chains = vec![chain("z", &[true]), chain("empty", &[]), chain("a", &[true, true])];

        let outcome = orchestrator(options(), &fs).run(chains).await.unwrap();

        let keys: Vec<_> = outcome.chains.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "empty", "a"]);
        assert_eq!(outcome.summary.counts.total, 3);
        assert!(outcome.summary.all_passed());
    }

    #[tokio::test]
    async fn ledger_is_written_only_after_a_full_passing_run() {
        let fs = MockFileSystem::new();

        let outcome = orchestrator(options(), &fs)
            .run(vec![chain("a", &[true]), chain("b", &[false, true])])
            .await
            .unwrap();
        assert!(!outcome.priorities_written);
        assert!(!fs.exists(std::path::Path::new("/ledger")));
        assert_eq!(outcome.chains[1].tasks[1].state, TaskState::Skipped);

        let mut partial = options();
        partial.full_suite = false;
        let outcome = orchestrator(partial, &fs)
            .run(vec![chain("a", &[true])])
            .await
            .unwrap();
        assert!(!outcome.priorities_written);

        let outcome = orchestrator(options(), &fs)
            .run(vec![chain("a", &[true]), chain("b", &[true])])
            .await
            .unwrap();
        assert!(outcome.priorities_written);
        assert!(fs.exists(std::path::Path::new("/ledger")));
    }

    #[tokio::test]
    async fn all_empty_chains_finish_without_workers() {
        let fs = MockFileSystem::new();
        let outcome = orchestrator(options(), &fs)
            .run(vec![chain("a", &[]), chain("b", &[])])
            .await
            .unwrap();
        assert_eq!(outcome.summary.counts.total, 0);
        assert_eq!(outcome.chains.len(), 2);
    }

    #[tokio::test]
    async fn live_output_goes_to_the_given_writer() {
        #[derive(Clone, Default)]
        struct Buf(Arc<Mutex<Vec<u8>>>);
        impl Write for Buf {
            fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(b);
                Ok(b.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let fs = MockFileSystem::new();
        let buf = Buf::default();
        let mut opts = options();
        opts.output = OutputMode::Normal;

        Orchestrator::new(opts)
            .with_fs(Arc::new(fs))
            .with_live_output(Box::new(buf.clone()))
            .run(vec![chain("only", &[true])])
            .await
            .unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("only t0 PASSED"));
        assert!(text.contains("--- SUITE PASSED 1/1 TASKS ---"));
    }
}
