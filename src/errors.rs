// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// One or more chains could not be built. Every diagnostic found during
    /// pre-flight is listed; no worker has started.
    #[error("Missing the following files:\n    {}", .0.join("\n    "))]
    MissingPreconditions(Vec<String>),

    /// The report sink could not be opened or written.
    #[error("Could not write report file {path:?}: {source}")]
    ReportSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chain not found: {0}")]
    ChainNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SuiteError>;
