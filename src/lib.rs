// src/lib.rs

pub mod chain;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod sched;
pub mod types;

use std::io::IsTerminal;
use std::sync::Arc;

use tracing::{debug, info};

use crate::chain::builder::resolve;
use crate::chain::ChainBuilder;
use crate::cli::CliArgs;
use crate::config::{config_root_dir, load_and_validate, SuiteFile};
use crate::engine::{Orchestrator, OrchestratorOptions};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::{unique_report_path, Summary};
use crate::sched::PriorityLedger;
use crate::types::{OutputMode, UNSEEN_RANK};

/// Report file name used in quiet mode when no report path is given.
pub const DEFAULT_REPORT_NAME: &str = "suiterun_results.txt";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - suite file loading and validation
/// - chain construction (with missing-precondition checks)
/// - command-line overrides of the `[suite]` section
/// - the orchestrator
///
/// Returns `None` for a dry run, otherwise the run summary.
pub async fn run(args: CliArgs) -> Result<Option<Summary>> {
    let cfg = load_and_validate(&args.config)?;
    let root = config_root_dir(&args.config);
    debug!(?root, config = ?args.config, "loaded suite file");

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let mut builder = ChainBuilder::new(&cfg, &root, fs.as_ref());
    if let Some(dir) = &args.output_dir {
        builder = builder.with_output_root(dir);
    }

    let ledger_path = match &args.ledger {
        Some(path) => path.clone(),
        None => resolve(&root, &cfg.suite.ledger),
    };

    if args.dry_run {
        print_dry_run(&cfg, &builder, &args.chains, &PriorityLedger::load(fs.as_ref(), &ledger_path));
        return Ok(None);
    }

    let chains = builder.build_suite(&cfg, &args.chains)?;

    let output = args.output_mode().unwrap_or(cfg.suite.output);
    let report_path = args
        .report
        .clone()
        .or_else(|| cfg.suite.report.as_ref().map(|p| resolve(&root, p)))
        .or_else(|| {
            (output == OutputMode::Quiet)
                .then(|| unique_report_path(&builder.output_root().join(DEFAULT_REPORT_NAME)))
        });
    if let Some(path) = &report_path {
        info!(?path, "writing report file");
    }

    let mut options = OrchestratorOptions::new(args.workers.unwrap_or(cfg.suite.workers), ledger_path);
    options.report_path = report_path;
    options.output = output;
    options.color = std::io::stdout().is_terminal();
    options.full_suite = args.chains.is_empty();

    let outcome = Orchestrator::new(options).with_fs(fs).run(chains).await?;
    Ok(Some(outcome.summary))
}

/// Print what would run: chains in schedule order with their ranks, tasks
/// and any missing preconditions.
fn print_dry_run(cfg: &SuiteFile, builder: &ChainBuilder<'_>, selected: &[String], ledger: &PriorityLedger) {
    println!("suiterun dry-run");
    println!("  suite.workers = {}", cfg.suite.workers);
    println!("  suite.output = {:?}", cfg.suite.output);
    println!("  ledger = {} ({} known chains)", ledger.path().display(), ledger.len());
    println!();

    let mut chains: Vec<(&String, u64)> = cfg
        .chain
        .keys()
        .filter(|k| selected.is_empty() || selected.contains(k))
        .map(|k| (k, ledger.rank_of(k).unwrap_or(UNSEEN_RANK)))
        .collect();
    chains.sort_by_key(|(_, rank)| *rank);

    println!("chains ({}):", chains.len());
    for (key, rank) in chains {
        let Some(chain_cfg) = cfg.chain.get(key) else {
            continue;
        };
        if rank == UNSEEN_RANK {
            println!("  - {key} (rank: unseen)");
        } else {
            println!("  - {key} (rank: {rank})");
        }
        for task in &chain_cfg.task {
            println!("      {}: {}", task.description, task.cmd);
        }
        if let Err(missing) = builder.build_chain(key, chain_cfg) {
            for diagnostic in missing {
                println!("      missing: {diagnostic}");
            }
        }
    }

    for key in selected.iter().filter(|k| !cfg.chain.contains_key(*k)) {
        println!("  ! unknown chain: {key}");
    }

    debug!("dry-run complete (no execution)");
}
