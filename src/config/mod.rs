// src/config/mod.rs

//! Suite file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a suite file from disk (`loader.rs`).
//! - Validate worker counts, chain keys and task definitions (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{ChainConfig, RawSuiteFile, SuiteFile, SuiteSection, TaskConfig};
pub use validate::validate_config;
