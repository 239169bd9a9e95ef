//! Error types for initialization and configuration.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum InitError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("unparsable config file: {0}")]
    UnparsableConfig(#[from] toml::de::Error),

    #[error("config: {0}")]
    MalformedConfig(#[from] ConfigError),

    #[error("datadir path is not valid utf-8: {0:?}")]
    InvalidDatadirPath(PathBuf),

    #[error("failed to build tokio runtime: {0}")]
    RuntimeBuild(#[source] io::Error),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// Tried to traverse into a primitive.
    #[error("can't traverse into non-table key: {0}")]
    TraverseNonTableAt(String),

    /// Invalid override string.
    #[error("invalid override: '{0}'")]
    InvalidOverride(String),
}
