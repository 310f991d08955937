use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use suiterun::chain::{Chain, Task, TaskRun, TaskRunner};
use suiterun::errors::{Result, SuiteError};

/// What a [`FakeTask`] does when run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    /// Returns a failed `TaskRun`.
    Fail,
    /// Returns an error from `run`.
    Error,
    /// Panics inside `run`.
    Panic,
}

/// Shared record of which fake tasks ran, in start order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog(Arc<Mutex<Vec<String>>>);

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"<chain> <task>"` labels in the order the tasks started.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Chain keys in the order their first task started.
    pub fn chain_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for entry in self.entries() {
            let key = entry.split(' ').next().unwrap_or_default().to_string();
            if !order.contains(&key) {
                order.push(key);
            }
        }
        order
    }

    fn record(&self, label: &str) {
        self.0.lock().unwrap().push(label.to_string());
    }
}

/// A scripted task: no process, just an outcome after an optional delay.
#[derive(Debug, Clone)]
pub struct FakeTask {
    label: String,
    outcome: Outcome,
    delay: Duration,
    log: Option<ExecutionLog>,
}

impl FakeTask {
    pub fn new(label: &str, outcome: Outcome) -> Self {
        Self {
            label: label.to_string(),
            outcome,
            delay: Duration::ZERO,
            log: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn recording(mut self, log: &ExecutionLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

impl TaskRunner for FakeTask {
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<TaskRun>> + Send + '_>> {
        Box::pin(async move {
            if let Some(log) = &self.log {
                log.record(&self.label);
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.outcome {
                Outcome::Pass => {
                    let mut run = TaskRun::passed();
                    run.command_line = Some(format!("fake {}", self.label));
                    Ok(run)
                }
                Outcome::Fail => Ok(TaskRun::failed(format!("{} failed", self.label))),
                Outcome::Error => Err(SuiteError::Other(anyhow::anyhow!(
                    "{} could not start",
                    self.label
                ))),
                Outcome::Panic => panic!("{} panicked", self.label),
            }
        })
    }
}

/// Builder for chains of fake tasks.
pub struct FakeChain {
    key: String,
    tasks: Vec<(String, FakeTask)>,
    log: Option<ExecutionLog>,
}

impl FakeChain {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            tasks: Vec::new(),
            log: None,
        }
    }

    /// Record every task of this chain in `log`.
    pub fn recording(mut self, log: &ExecutionLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn task(self, description: &str, outcome: Outcome) -> Self {
        self.task_with_delay(description, outcome, Duration::ZERO)
    }

    pub fn task_with_delay(mut self, description: &str, outcome: Outcome, delay: Duration) -> Self {
        let label = format!("{} {}", self.key, description);
        let fake = FakeTask::new(&label, outcome).with_delay(delay);
        self.tasks.push((description.to_string(), fake));
        self
    }

    pub fn build(self) -> Chain {
        let mut chain = Chain::new(self.key.as_str());
        for (description, mut fake) in self.tasks {
            if let Some(log) = &self.log {
                fake = fake.recording(log);
            }
            chain.push_task(Task::new(description, Box::new(fake)));
        }
        chain
    }
}
