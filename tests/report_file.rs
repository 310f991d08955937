// tests/report_file.rs

mod common;
use crate::common::{
    init_tracing, quiet_options, with_timeout, CapturedOutput, FakeChain, Outcome,
};

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use suiterun::engine::Orchestrator;
use suiterun::errors::SuiteError;
use suiterun::fs::mock::MockFileSystem;
use suiterun::report::ReportSink;
use suiterun::types::OutputMode;

/// Report writer that accepts a fixed number of writes and then fails.
#[derive(Clone)]
struct BreaksAfter {
    written: CapturedOutput,
    remaining: Arc<Mutex<usize>>,
}

impl BreaksAfter {
    fn new(writes: usize) -> Self {
        Self {
            written: CapturedOutput::default(),
            remaining: Arc::new(Mutex::new(writes)),
        }
    }
}

impl Write for BreaksAfter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        *remaining -= 1;
        self.written.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn report_file_holds_header_chain_blocks_and_summary() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("reports/suite.txt");
    std::fs::create_dir_all(report.parent().unwrap()).unwrap();
    std::fs::write(&report, "left over from last time\n").unwrap();

    let mut options = quiet_options(2);
    options.report_path = Some(report.clone());
    let fs = MockFileSystem::new();

    let outcome = with_timeout(
        common::orchestrator(options, &fs).run(vec![
            FakeChain::new("ok").task("build", Outcome::Pass).build(),
            FakeChain::new("bad")
                .task("build", Outcome::Fail)
                .task("test", Outcome::Pass)
                .build(),
        ]),
    )
    .await
    .unwrap();
    assert_eq!(outcome.summary.counts.total, 3);

    let text = std::fs::read_to_string(&report).unwrap();
    assert!(!text.contains("left over"));
    assert!(text.starts_with("Ran the following chains:\n    ok\n    bad\n"));
    assert!(text.contains("Ran tasks in 2 parallel workers"));
    assert!(text.contains("Chain: ok"));
    assert!(text.contains("Chain: bad"));
    assert!(text.contains("bad build failed"));
    assert!(text.contains("--- SKIPPED"));
    assert!(text.contains("--- SUITE FAILED 1/3 TASKS ---"));
    assert!(text.contains("Failed tasks:\n    bad build\n"));
    assert!(text.contains("Skipped tasks:\n    bad test\n"));
    // Report files are never coloured.
    assert!(!text.contains('\x1B'));
}

#[tokio::test]
async fn unopenable_report_file_aborts_before_any_task() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("plain-file");
    std::fs::write(&not_a_dir, "x").unwrap();

    let log = common::ExecutionLog::new();
    let mut options = quiet_options(1);
    options.report_path = Some(not_a_dir.join("report.txt"));
    let fs = MockFileSystem::new();

    let err = with_timeout(
        common::orchestrator(options, &fs)
            .run(vec![FakeChain::new("a").recording(&log).task("t", Outcome::Pass).build()]),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SuiteError::ReportSink { .. }));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn normal_output_shows_failures_and_summary() {
    init_tracing();
    let live = CapturedOutput::default();
    let mut options = quiet_options(1);
    options.output = OutputMode::Normal;

    with_timeout(
        Orchestrator::new(options)
            .with_fs(Arc::new(MockFileSystem::new()))
            .with_live_output(Box::new(live.clone()))
            .run(vec![
                FakeChain::new("x").task("one", Outcome::Pass).build(),
                FakeChain::new("y").task("two", Outcome::Fail).build(),
            ]),
    )
    .await
    .unwrap();

    let text = live.text();
    assert!(text.contains(" 1 passed/ 0 failed/ 0 skipped x one PASSED"));
    assert!(text.contains(" 1 passed/ 1 failed/ 0 skipped y two FAILED"));
    assert!(text.contains("Error Messages:\ny two failed"));
    assert!(text.contains("--- SUITE FAILED 1/2 TASKS ---"));
    assert!(!text.contains("STARTED"));
}

#[tokio::test]
async fn verbose_output_ends_with_every_chain() {
    init_tracing();
    let live = CapturedOutput::default();
    let mut options = quiet_options(2);
    options.output = OutputMode::Verbose;

    with_timeout(
        Orchestrator::new(options)
            .with_fs(Arc::new(MockFileSystem::new()))
            .with_live_output(Box::new(live.clone()))
            .run(vec![
                FakeChain::new("x").task("one", Outcome::Pass).build(),
                FakeChain::new("y").task("two", Outcome::Pass).build(),
            ]),
    )
    .await
    .unwrap();

    let text = live.text();
    assert!(text.contains("x one STARTED"));
    assert!(text.contains("Chain: x"));
    assert!(text.contains("Chain: y"));
    assert!(text.contains("--- SUITE PASSED 2/2 TASKS ---"));
}

#[tokio::test]
async fn quiet_output_prints_nothing() {
    init_tracing();
    let live = CapturedOutput::default();

    with_timeout(
        Orchestrator::new(quiet_options(1))
            .with_fs(Arc::new(MockFileSystem::new()))
            .with_live_output(Box::new(live.clone()))
            .run(vec![FakeChain::new("x").task("one", Outcome::Fail).build()]),
    )
    .await
    .unwrap();

    assert!(live.text().is_empty());
}

#[tokio::test]
async fn report_failure_mid_run_stops_queued_chains() {
    init_tracing();
    let log = common::ExecutionLog::new();
    // Header and the first chain block make it out; the second block fails.
    let writer = BreaksAfter::new(2);
    let sink = ReportSink::from_writer("/reports/suite.txt", Box::new(writer.clone()));
    let fs = MockFileSystem::new();

    let chains = ["a", "b", "c", "d"]
        .into_iter()
        .map(|key| FakeChain::new(key).recording(&log).task("t", Outcome::Pass).build())
        .collect();

    let err = with_timeout(
        common::orchestrator(quiet_options(1), &fs)
            .with_report_sink(sink)
            .run(chains),
    )
    .await
    .unwrap_err();

    match err {
        SuiteError::ReportSink { path, .. } => assert_eq!(path, Path::new("/reports/suite.txt")),
        other => panic!("expected ReportSink, got {other:?}"),
    }
    assert_eq!(log.chain_order(), vec!["a".to_string(), "b".to_string()]);

    let text = writer.written.text();
    assert!(text.contains("Chain: a"));
    assert!(!text.contains("Chain: b"));
    assert!(!text.contains("SUITE"));
    assert!(fs.contents(common::LEDGER).is_none());
}

#[tokio::test]
async fn report_failure_lets_running_chains_finish() {
    init_tracing();
    let log = common::ExecutionLog::new();
    let writer = BreaksAfter::new(1);
    let sink = ReportSink::from_writer("/reports/suite.txt", Box::new(writer));
    let fs = MockFileSystem::new();

    let chains = vec![
        FakeChain::new("quick")
            .recording(&log)
            .task_with_delay("t", Outcome::Pass, Duration::from_millis(50))
            .build(),
        FakeChain::new("slow")
            .recording(&log)
            .task_with_delay("t", Outcome::Pass, Duration::from_millis(300))
            .task("after", Outcome::Pass)
            .build(),
        FakeChain::new("queued").recording(&log).task("t", Outcome::Pass).build(),
    ];

    let err = with_timeout(
        common::orchestrator(quiet_options(2), &fs)
            .with_report_sink(sink)
            .run(chains),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SuiteError::ReportSink { .. }));
    // `slow` was already running when the sink broke and still ran to the end.
    let entries = log.entries();
    assert!(entries.contains(&"slow after".to_string()));
    assert!(!entries.iter().any(|e| e.starts_with("queued")));
}
