// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSuiteFile, SuiteFile};
use crate::errors::Result;

/// Load a suite file from a given path and return the raw `RawSuiteFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSuiteFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawSuiteFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a suite file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks worker count, chain keys and task definitions.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SuiteFile> {
    let raw_config = load_from_path(&path)?;
    let config = SuiteFile::try_from(raw_config)?;
    Ok(config)
}

/// Directory relative paths in a suite file are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "suites/Suiterun.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Suiterun.toml" (parent = ""),
///   we fall back to the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
