#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use suiterun::config::{ChainConfig, RawSuiteFile, SuiteFile, SuiteSection, TaskConfig};
use suiterun::types::OutputMode;

/// Builder for `SuiteFile` to simplify test setup.
pub struct SuiteFileBuilder {
    config: RawSuiteFile,
}

impl SuiteFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawSuiteFile {
                suite: SuiteSection::default(),
                chain: BTreeMap::new(),
            },
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.suite.workers = workers;
        self
    }

    pub fn ledger(mut self, path: &str) -> Self {
        self.config.suite.ledger = PathBuf::from(path);
        self
    }

    pub fn output_dir(mut self, path: &str) -> Self {
        self.config.suite.output_dir = PathBuf::from(path);
        self
    }

    pub fn output(mut self, mode: OutputMode) -> Self {
        self.config.suite.output = mode;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.suite.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_chain(mut self, key: &str, chain: ChainConfig) -> Self {
        self.config.chain.insert(key.to_string(), chain);
        self
    }

    /// The raw file, for exercising validation directly.
    pub fn build_raw(self) -> RawSuiteFile {
        self.config
    }

    pub fn build(self) -> SuiteFile {
        SuiteFile::try_from(self.config).expect("Failed to build valid suite file from builder")
    }
}

impl Default for SuiteFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ChainConfig`.
pub struct ChainConfigBuilder {
    chain: ChainConfig,
}

impl ChainConfigBuilder {
    pub fn new() -> Self {
        Self {
            chain: ChainConfig::default(),
        }
    }

    pub fn source_dir(mut self, path: &str) -> Self {
        self.chain.source_dir = Some(PathBuf::from(path));
        self
    }

    pub fn output_dir(mut self, path: &str) -> Self {
        self.chain.output_dir = Some(PathBuf::from(path));
        self
    }

    pub fn requires(mut self, path: &str) -> Self {
        self.chain.requires.push(PathBuf::from(path));
        self
    }

    pub fn task(mut self, task: TaskConfig) -> Self {
        self.chain.task.push(task);
        self
    }

    pub fn build(self) -> ChainConfig {
        self.chain
    }
}

impl Default for ChainConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(description: &str, cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                description: description.to_string(),
                cmd: cmd.to_string(),
                ..TaskConfig::default()
            },
        }
    }

    pub fn requires(mut self, path: &str) -> Self {
        self.task.requires.push(PathBuf::from(path));
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.task.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
