// ABOUTME: Application-wide error types for fleetdown.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::power::{ClassifyError, PowerError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("cannot read fleet file {path}: {source}")]
    FleetRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid fleet file {path}: {source}")]
    FleetParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Power(#[from] PowerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
