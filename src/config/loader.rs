//! Reading rule files from TOML.
//!
//! Parsing and validation know nothing about where the text came from, so
//! [`load_from_str`] fails with a [`RuleFileError`]. [`load_from_path`] wraps
//! that in a [`ConfigError`] naming the file.

use crate::config::schema::{PatchConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What is wrong with the contents of a rule file.
#[derive(Error, Debug)]
pub enum RuleFileError {
    #[error("malformed TOML: {0}")]
    Toml(#[from] toml_edit::de::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("rule file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: RuleFileError,
    },
}

/// Parse and validate rule file text. Every rule's pattern is compiled as
/// part of validation.
pub fn load_from_str(input: &str) -> Result<PatchConfig, RuleFileError> {
    let config: PatchConfig = toml_edit::de::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    load_from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
