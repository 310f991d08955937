// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::OutputMode;

/// Suite file exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [suite]
/// workers = 4
/// ledger = ".suiterun/priorities"
/// report = "suite-report.txt"
/// output_dir = "suite_out"
/// output = "normal"
///
/// [suite.env]
/// OMP_NUM_THREADS = "1"
///
/// [chain."keck_deimos/1200G"]
/// source_dir = "RAW_DATA/keck_deimos/1200G"
/// requires = ["RAW_DATA/keck_deimos/1200G"]
///
/// [[chain."keck_deimos/1200G".task]]
/// description = "reduce"
/// cmd = "run_pipeline reduce"
/// ```
///
/// All sections except `chain` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuiteFile {
    #[serde(default)]
    pub suite: SuiteSection,

    /// All chains from `[chain.<key>]`, keyed by chain key.
    #[serde(default)]
    pub chain: BTreeMap<String, ChainConfig>,
}

/// Validated suite file. Only constructible through `TryFrom<RawSuiteFile>`.
#[derive(Debug, Clone)]
pub struct SuiteFile {
    pub suite: SuiteSection,
    pub chain: BTreeMap<String, ChainConfig>,
}

impl SuiteFile {
    pub(crate) fn new_unchecked(suite: SuiteSection, chain: BTreeMap<String, ChainConfig>) -> Self {
        Self { suite, chain }
    }
}

/// `[suite]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteSection {
    /// Number of parallel workers. Must be >= 1.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Priority ledger location.
    #[serde(default = "default_ledger")]
    pub ledger: PathBuf,

    /// Durable report file. Disabled when absent.
    #[serde(default)]
    pub report: Option<PathBuf>,

    /// Root for per-chain output directories and task logs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub output: OutputMode,

    /// Environment variables set for every task command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_workers() -> usize {
    1
}

fn default_ledger() -> PathBuf {
    PathBuf::from(".suiterun/priorities")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("suite_out")
}

impl Default for SuiteSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            ledger: default_ledger(),
            report: None,
            output_dir: default_output_dir(),
            output: OutputMode::default(),
            env: BTreeMap::new(),
        }
    }
}

/// `[chain.<key>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// Input directory, shown in reports.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Output directory. Defaults to `<suite.output_dir>/<key>`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Paths that must exist before this chain may be scheduled.
    #[serde(default)]
    pub requires: Vec<PathBuf>,

    /// Tasks in execution order.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[[chain.<key>.task]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    pub description: String,
    pub cmd: String,

    /// Paths that must exist before the chain owning this task may be
    /// scheduled.
    #[serde(default)]
    pub requires: Vec<PathBuf>,

    /// Kill the command if it runs longer than this.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
