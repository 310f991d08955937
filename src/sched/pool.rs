// src/sched/pool.rs

//! Fixed pool of workers pulling chains from the scheduler queue.
//!
//! Each worker runs on its own Tokio task, so on the multi-threaded runtime
//! workers execute in parallel. A worker owns a chain from the moment it
//! pops it until it acknowledges it.
//!
//! Shutdown is the only polled coordination in the scheduler: after a
//! bounded pop comes back empty, a worker reads the shared `complete` flag
//! and exits if it is set. That only bounds shutdown latency; the
//! orchestrator decides completion through [`SchedulerQueue::drain`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::chain::{run_chain, Chain};
use crate::errors::{Result, SuiteError};
use crate::report::Reporter;
use crate::sched::queue::SchedulerQueue;

/// How long a worker waits on an empty queue before rechecking shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<Vec<Chain>>>,
    complete: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `workers` workers. Requires a running Tokio runtime.
    pub fn start(
        workers: usize,
        queue: Arc<SchedulerQueue<Chain>>,
        reporter: Arc<Reporter>,
        poll_interval: Duration,
    ) -> Self {
        let complete = Arc::new(AtomicBool::new(false));
        info!(workers, "starting worker pool");

        let handles = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    reporter: Arc::clone(&reporter),
                    complete: Arc::clone(&complete),
                    poll_interval,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self { handles, complete }
    }

    /// Tell workers no more chains will arrive. Idle workers exit on their
    /// next empty pop.
    pub fn signal_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    /// Signal completion and wait for every worker, returning all chains
    /// they executed.
    pub async fn join(self) -> Result<Vec<Chain>> {
        self.signal_complete();

        let mut chains = Vec::new();
        for handle in self.handles {
            let ran = handle
                .await
                .map_err(|e| SuiteError::Other(anyhow::anyhow!("worker stopped abnormally: {e}")))?;
            chains.extend(ran);
        }
        Ok(chains)
    }
}

struct Worker {
    id: usize,
    queue: Arc<SchedulerQueue<Chain>>,
    reporter: Arc<Reporter>,
    complete: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Worker {
    async fn run(self) -> Vec<Chain> {
        debug!(worker = self.id, "worker started");
        let mut finished = Vec::new();

        loop {
            let Some(mut chain) = self.queue.pop(self.poll_interval).await else {
                if self.complete.load(Ordering::Acquire) {
                    break;
                }
                continue;
            };

            debug!(worker = self.id, chain = %chain.key, rank = chain.rank, "picked up chain");
            let passed = run_chain(&mut chain, self.reporter.as_ref()).await;

            if let Err(e) = self.reporter.chain_completed(&chain) {
                error!(worker = self.id, chain = %chain.key, error = %e, "report sink failed; abandoning queued chains");
                let abandoned = self.queue.clear();
                if !abandoned.is_empty() {
                    error!(worker = self.id, count = abandoned.len(), "dropped chains that never ran");
                }
            }

            self.queue.acknowledge();
            debug!(worker = self.id, chain = %chain.key, passed, "finished chain");
            finished.push(chain);
        }

        debug!(worker = self.id, chains = finished.len(), "worker exiting");
        finished
    }
}
