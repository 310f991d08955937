#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use suiterun::engine::{Orchestrator, OrchestratorOptions};
use suiterun::fs::mock::MockFileSystem;
use suiterun::types::OutputMode;

pub use suiterun_test_utils::fake_task::{ExecutionLog, FakeChain, Outcome};
pub use suiterun_test_utils::{builders, init_tracing, with_timeout};

pub const LEDGER: &str = "/suite/.suiterun/priorities";

/// In-memory live output that tests can read back.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Options for a quiet in-memory run with a short worker poll interval.
pub fn quiet_options(workers: usize) -> OrchestratorOptions {
    let mut options = OrchestratorOptions::new(workers, LEDGER);
    options.output = OutputMode::Quiet;
    options.poll_interval = Duration::from_millis(20);
    options
}

/// Orchestrator backed by `fs` whose live output is discarded.
pub fn orchestrator(options: OrchestratorOptions, fs: &MockFileSystem) -> Orchestrator {
    Orchestrator::new(options)
        .with_fs(Arc::new(fs.clone()))
        .with_live_output(Box::new(io::sink()))
}
