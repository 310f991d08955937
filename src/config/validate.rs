// src/config/validate.rs

use crate::config::model::{RawSuiteFile, SuiteFile};
use crate::errors::{Result, SuiteError};

impl TryFrom<RawSuiteFile> for SuiteFile {
    type Error = crate::errors::SuiteError;

    fn try_from(raw: RawSuiteFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(SuiteFile::new_unchecked(raw.suite, raw.chain))
    }
}

/// Run every semantic check on a raw suite file.
pub fn validate_config(cfg: &RawSuiteFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawSuiteFile) -> Result<()> {
    ensure_has_chains(cfg)?;
    validate_suite_section(cfg)?;
    validate_chain_keys(cfg)?;
    validate_tasks(cfg)?;
    Ok(())
}

fn ensure_has_chains(cfg: &RawSuiteFile) -> Result<()> {
    if cfg.chain.is_empty() {
        return Err(SuiteError::ConfigError(
            "suite must contain at least one [chain.<key>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_suite_section(cfg: &RawSuiteFile) -> Result<()> {
    if cfg.suite.workers == 0 {
        return Err(SuiteError::ConfigError(
            "[suite].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_chain_keys(cfg: &RawSuiteFile) -> Result<()> {
    for key in cfg.chain.keys() {
        if key.trim().is_empty() {
            return Err(SuiteError::ConfigError(
                "chain keys must not be empty".to_string(),
            ));
        }
        // The priority ledger stores one key per line.
        if key.contains('\n') || key.contains('\r') {
            return Err(SuiteError::ConfigError(format!(
                "chain key {key:?} must not contain line breaks"
            )));
        }
        if key.trim() != key {
            return Err(SuiteError::ConfigError(format!(
                "chain key {key:?} must not start or end with whitespace"
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawSuiteFile) -> Result<()> {
    for (key, chain) in cfg.chain.iter() {
        for (idx, task) in chain.task.iter().enumerate() {
            if task.description.trim().is_empty() {
                return Err(SuiteError::ConfigError(format!(
                    "task #{} of chain '{}' has an empty description",
                    idx + 1,
                    key
                )));
            }
            if task.cmd.trim().is_empty() {
                return Err(SuiteError::ConfigError(format!(
                    "task '{}' of chain '{}' has an empty cmd",
                    task.description, key
                )));
            }
            if task.timeout_secs == Some(0) {
                return Err(SuiteError::ConfigError(format!(
                    "task '{}' of chain '{}': timeout_secs must be >= 1",
                    task.description, key
                )));
            }
        }
    }
    Ok(())
}
