// src/chain/builder.rs

//! Builds schedulable chains from a validated suite file.
//!
//! Construction is fallible per chain: a chain whose required inputs are
//! missing yields the list of diagnostics instead of a [`Chain`]. The suite
//! builder gathers the diagnostics of every chain before failing, so a single
//! pre-flight run reports all missing files at once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::chain::task::{Chain, Task};
use crate::config::model::{ChainConfig, SuiteFile};
use crate::errors::{Result, SuiteError};
use crate::exec::CommandTask;
use crate::fs::FileSystem;

/// Everything needed to turn a `[chain.<key>]` section into a [`Chain`].
#[derive(Debug)]
pub struct ChainBuilder<'a> {
    fs: &'a dyn FileSystem,
    /// Directory relative paths in the suite file are resolved against.
    root: PathBuf,
    /// Resolved `[suite].output_dir`.
    output_root: PathBuf,
    env: Vec<(String, String)>,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(cfg: &SuiteFile, root: impl Into<PathBuf>, fs: &'a dyn FileSystem) -> Self {
        let root = root.into();
        let output_root = resolve(&root, &cfg.suite.output_dir);
        Self {
            fs,
            root,
            output_root,
            env: cfg
                .suite
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Override the output root (e.g. from `--output-dir`).
    pub fn with_output_root(mut self, output_root: impl AsRef<Path>) -> Self {
        self.output_root = resolve(&self.root, output_root.as_ref());
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Build one chain, or list every missing precondition that prevents it.
    pub fn build_chain(
        &self,
        key: &str,
        cfg: &ChainConfig,
    ) -> std::result::Result<Chain, Vec<String>> {
        let missing: Vec<String> = cfg
            .requires
            .iter()
            .chain(cfg.task.iter().flat_map(|t| t.requires.iter()))
            .map(|p| resolve(&self.root, p))
            .filter(|p| !self.fs.exists(p))
            .map(|p| format!("{key}: {}", p.display()))
            .collect();

        if !missing.is_empty() {
            debug!(chain = %key, missing = missing.len(), "chain has missing preconditions");
            return Err(missing);
        }

        let output_dir = match &cfg.output_dir {
            Some(dir) => resolve(&self.root, dir),
            None => self.output_root.join(key),
        };
        let source_dir = cfg.source_dir.as_ref().map(|d| resolve(&self.root, d));

        let mut chain = Chain::new(key).with_dirs(source_dir, Some(output_dir.clone()));
        for (idx, task_cfg) in cfg.task.iter().enumerate() {
            let log_path = output_dir.join(log_file_name(idx, &task_cfg.description));
            let mut runner = CommandTask::new(&task_cfg.cmd, log_path)
                .workdir(&output_dir)
                .timeout(task_cfg.timeout_secs.map(Duration::from_secs));
            for (k, v) in &self.env {
                runner = runner.env(k, v);
            }
            chain.push_task(Task::new(&task_cfg.description, Box::new(runner)));
        }

        Ok(chain)
    }

    /// Build the chains named in `selected` (all chains when empty).
    ///
    /// Fails with [`SuiteError::MissingPreconditions`] if any chain is
    /// missing inputs, listing the diagnostics of every chain. Output
    /// directories are only created once every chain has been built.
    pub fn build_suite(&self, cfg: &SuiteFile, selected: &[String]) -> Result<Vec<Chain>> {
        for key in selected {
            if !cfg.chain.contains_key(key) {
                return Err(SuiteError::ChainNotFound(key.clone()));
            }
        }

        let mut chains = Vec::new();
        let mut missing = Vec::new();

        for (key, chain_cfg) in cfg.chain.iter() {
            if !selected.is_empty() && !selected.contains(key) {
                continue;
            }
            match self.build_chain(key, chain_cfg) {
                Ok(chain) => chains.push(chain),
                Err(diagnostics) => missing.extend(diagnostics),
            }
        }

        if !missing.is_empty() {
            return Err(SuiteError::MissingPreconditions(missing));
        }

        for chain in &chains {
            if let Some(dir) = &chain.output_dir {
                if !self.fs.is_dir(dir) {
                    self.fs.create_dir_all(dir)?;
                }
            }
        }

        info!(chains = chains.len(), "built suite");
        Ok(chains)
    }
}

/// `path` itself if absolute, otherwise `root.join(path)`.
pub(crate) fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// `03-flux_calibrate.log` for the fourth task described as "flux calibrate".
fn log_file_name(idx: usize, description: &str) -> String {
    let slug: String = description
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{idx:02}-{slug}.log")
}
