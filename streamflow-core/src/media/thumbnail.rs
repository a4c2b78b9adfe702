use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::ThumbnailError;
use super::executor::{describe, invoke, CommandExecutor, InvocationFailure, SystemCommandExecutor};
use super::probe::{leading_float, MediaProbe};

/// Seek offset used when a percentage cannot be resolved.
pub const DEFAULT_SEEK_SECONDS: u64 = 10;

/// Where in the video the preview frame is taken from.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekTimestamp {
    /// Passed to ffmpeg verbatim (`"10"`, `"00:01:30"`, `"12.5"`).
    Absolute(String),
    /// Numeric part of a `"NN%"` value, resolved against the probed duration.
    Percentage(String),
}

impl SeekTimestamp {
    pub fn seconds(value: u64) -> Self {
        SeekTimestamp::Absolute(value.to_string())
    }
}

impl From<u64> for SeekTimestamp {
    fn from(value: u64) -> Self {
        SeekTimestamp::seconds(value)
    }
}

impl From<f64> for SeekTimestamp {
    fn from(value: f64) -> Self {
        SeekTimestamp::Absolute(value.to_string())
    }
}

impl FromStr for SeekTimestamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err("seek timestamp must not be empty".to_string());
        }
        match value.strip_suffix('%') {
            Some(percentage) => Ok(SeekTimestamp::Percentage(percentage.to_string())),
            None => Ok(SeekTimestamp::Absolute(value.to_string())),
        }
    }
}

impl fmt::Display for SeekTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekTimestamp::Absolute(value) => f.write_str(value),
            SeekTimestamp::Percentage(value) => write!(f, "{value}%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailOptions {
    pub timestamp: SeekTimestamp,
    /// `WxH` passed to the scale filter.
    pub size: String,
    /// ffmpeg `-q:v`; lower is better.
    pub quality: u32,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            timestamp: SeekTimestamp::Percentage("10".into()),
            size: "854x480".into(),
            quality: 2,
        }
    }
}

/// Numeric prefix of a percentage, kept only when it lies in `[0, 100]`.
fn percentage_value(percentage: &str) -> Option<f64> {
    leading_float(percentage).filter(|value| (0.0..=100.0).contains(value))
}

fn seconds_into(duration: f64, percent: f64) -> String {
    let seconds = (duration * percent / 100.0).floor();
    format!("{}", seconds.max(0.0) as u64)
}

/// Converts a percentage of `duration` into whole seconds.
///
/// Non-numeric or out-of-range percentages resolve to [`DEFAULT_SEEK_SECONDS`].
pub fn resolve_percentage(percentage: &str, duration: f64) -> String {
    match percentage_value(percentage) {
        Some(percent) => seconds_into(duration, percent),
        None => DEFAULT_SEEK_SECONDS.to_string(),
    }
}

#[derive(Clone)]
pub struct ThumbnailGenerator {
    ffmpeg: PathBuf,
    probe: MediaProbe,
    timeout: Option<Duration>,
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for ThumbnailGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailGenerator")
            .field("ffmpeg", &self.ffmpeg)
            .field("probe", &self.probe)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ThumbnailGenerator {
    pub fn new(ffmpeg: impl Into<PathBuf>, probe: MediaProbe) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            probe,
            timeout: None,
            executor: Arc::new(SystemCommandExecutor),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the seek offset ffmpeg receives.
    ///
    /// Unusable percentages and probe failures fall back to the default offset;
    /// only an in-range percentage runs the probe.
    pub async fn resolve_timestamp(&self, video: &Path, timestamp: &SeekTimestamp) -> String {
        let percentage = match timestamp {
            SeekTimestamp::Absolute(value) => return value.clone(),
            SeekTimestamp::Percentage(percentage) => percentage,
        };
        let Some(percent) = percentage_value(percentage) else {
            warn!(
                percentage = %percentage,
                "percentage seek is not a number in 0-100, using {DEFAULT_SEEK_SECONDS}s"
            );
            return DEFAULT_SEEK_SECONDS.to_string();
        };
        match self.probe.duration(video).await {
            Ok(duration) => seconds_into(duration, percent),
            Err(err) => {
                warn!(
                    file = %video.display(),
                    error = %err,
                    "could not probe duration for percentage seek, using {DEFAULT_SEEK_SECONDS}s"
                );
                DEFAULT_SEEK_SECONDS.to_string()
            }
        }
    }

    pub async fn generate(
        &self,
        video: &Path,
        output: &Path,
        options: &ThumbnailOptions,
    ) -> Result<PathBuf, ThumbnailError> {
        let seek = self.resolve_timestamp(video, &options.timestamp).await;

        if let Some(parent) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ThumbnailError::Io {
                    source,
                    path: parent.to_path_buf(),
                })?;
        }

        let mut command = Command::new(&self.ffmpeg);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .arg("-i")
            .arg(video)
            .arg("-ss")
            .arg(&seek)
            .arg("-vframes")
            .arg("1")
            .arg("-vf")
            .arg(format!("scale={}", options.size))
            .arg("-q:v")
            .arg(options.quality.to_string())
            .arg("-y")
            .arg(output);
        debug!(command = %describe(&command), "extracting thumbnail");

        let result = invoke(self.executor.as_ref(), &mut command, self.timeout)
            .await
            .map_err(|failure| match failure {
                InvocationFailure::Spawn(source) => ThumbnailError::Spawn {
                    program: self.ffmpeg.clone(),
                    source,
                },
                InvocationFailure::TimedOut(limit) => ThumbnailError::Timeout(limit),
            })?;

        if !result.status.success() {
            return Err(ThumbnailError::Exit {
                exit_code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        // ffmpeg can exit 0 without writing anything (seek past the end).
        if !fs::try_exists(output).await.unwrap_or(false) {
            return Err(ThumbnailError::NotCreated {
                path: output.to_path_buf(),
            });
        }
        Ok(output.to_path_buf())
    }
}
