use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("database error: {0}")]
    Execute(#[from] rusqlite::Error),
    #[error("store path not configured")]
    MissingStore,
    #[error("invalid stream status: {0}")]
    InvalidStatus(String),
    #[error("stream key {stream_key} is already used by another stream")]
    StreamKeyInUse { stream_key: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("migration {version} failed: {source}")]
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
