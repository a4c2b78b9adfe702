#![allow(dead_code)]

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use streamflow_core::CommandExecutor;
use tokio::process::Command;

pub const PROBE_1080P: &str = r#"{
    "streams": [
        {"codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "30000/1001"},
        {"codec_type": "audio", "avg_frame_rate": "0/0"}
    ],
    "format": {"duration": "120.000000", "bit_rate": "4500000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
}"#;

#[derive(Debug, Clone)]
pub struct Reply {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Writes a placeholder image at the command's last argument.
    pub create_output: bool,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            create_output: false,
            delay: None,
        }
    }

    pub fn frame() -> Self {
        Self {
            create_output: true,
            ..Self::ok("")
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self {
            code,
            stderr: stderr.to_string(),
            ..Self::ok("")
        }
    }

    pub fn hang(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok("{}")
        }
    }
}

/// Answers by program file name (`ffprobe`, `ffmpeg`) and records every invocation.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    probe: Mutex<Option<Reply>>,
    transcode: Mutex<Option<Reply>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedExecutor {
    pub fn new(probe: Reply, transcode: Reply) -> Arc<Self> {
        Arc::new(Self {
            probe: Mutex::new(Some(probe)),
            transcode: Mutex::new(Some(transcode)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == program)
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
        let std = command.as_std();
        let program = PathBuf::from(std.get_program())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let args: Vec<String> = std
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push((program.clone(), args.clone()));

        let reply = match program.as_str() {
            "ffprobe" => self.probe.lock().unwrap().clone(),
            "ffmpeg" => self.transcode.lock().unwrap().clone(),
            _ => None,
        };
        let Some(reply) = reply else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{program} not scripted"),
            ));
        };
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        if reply.create_output {
            if let Some(target) = args.last() {
                std::fs::write(target, b"\xff\xd8\xff\xd9")?;
            }
        }
        Ok(Output {
            status: ExitStatus::from_raw(reply.code << 8),
            stdout: reply.stdout.into_bytes(),
            stderr: reply.stderr.into_bytes(),
        })
    }
}
