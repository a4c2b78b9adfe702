use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

/// Runs a fully built command to completion and captures its output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
        command.output().await
    }
}

/// Locations of the external inspection and transcoding tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTools {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl MediaTools {
    /// System installs under `/usr/bin` win; otherwise the bare names go through `PATH`.
    pub fn discover() -> Self {
        Self::discover_in(Path::new("/usr/bin"))
    }

    pub fn discover_in(system_dir: &Path) -> Self {
        let ffprobe = system_dir.join("ffprobe");
        let ffmpeg = system_dir.join("ffmpeg");
        if ffprobe.exists() && ffmpeg.exists() {
            Self { ffprobe, ffmpeg }
        } else {
            Self {
                ffprobe: PathBuf::from("ffprobe"),
                ffmpeg: PathBuf::from("ffmpeg"),
            }
        }
    }
}

pub(crate) enum InvocationFailure {
    Spawn(std::io::Error),
    TimedOut(Duration),
}

/// `kill_on_drop` must be set on `command`; dropping the future on timeout reaps the child.
pub(crate) async fn invoke(
    executor: &dyn CommandExecutor,
    command: &mut Command,
    limit: Option<Duration>,
) -> Result<Output, InvocationFailure> {
    let result = match limit {
        Some(limit) => timeout(limit, executor.run(command))
            .await
            .map_err(|_| InvocationFailure::TimedOut(limit))?,
        None => executor.run(command).await,
    };
    result.map_err(InvocationFailure::Spawn)
}

pub(crate) fn describe(command: &Command) -> String {
    let std = command.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().to_string()];
    parts.extend(std.get_args().map(|arg| arg.to_string_lossy().to_string()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discover_prefers_system_binaries() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("ffprobe"), b"").unwrap();
        std::fs::write(dir.path().join("ffmpeg"), b"").unwrap();
        let tools = MediaTools::discover_in(dir.path());
        assert_eq!(tools.ffprobe, dir.path().join("ffprobe"));
        assert_eq!(tools.ffmpeg, dir.path().join("ffmpeg"));
    }

    #[test]
    fn discover_falls_back_to_path_lookup() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("ffprobe"), b"").unwrap();
        let tools = MediaTools::discover_in(dir.path());
        assert_eq!(tools.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn describe_joins_program_and_args() {
        let mut command = Command::new("ffprobe");
        command.arg("-v").arg("quiet");
        assert_eq!(describe(&command), "ffprobe -v quiet");
    }
}
