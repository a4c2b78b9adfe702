use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("ffprobe exited with status {exit_code:?}: {stderr}")]
    Exit {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),
    #[error("ffprobe timed out after {0:?}")]
    Timeout(Duration),
}

impl From<serde_json::Error> for ProbeError {
    fn from(source: serde_json::Error) -> Self {
        ProbeError::Parse(source.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("ffmpeg exited with status {exit_code:?}: {stderr}")]
    Exit {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("thumbnail file was not created at {path}")]
    NotCreated { path: PathBuf },
    #[error("ffmpeg timed out after {0:?}")]
    Timeout(Duration),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}
