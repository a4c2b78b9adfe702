use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading `streamflow.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("malformed config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
