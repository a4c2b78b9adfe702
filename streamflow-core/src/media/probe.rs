use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use super::error::ProbeError;
use super::executor::{describe, invoke, CommandExecutor, InvocationFailure, SystemCommandExecutor};

/// Normalized technical metadata for one media file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeResult {
    /// Seconds; zero when the container does not report it.
    pub duration: f64,
    pub format: String,
    /// `WxH`, empty when the file has no video stream.
    pub resolution: String,
    pub bitrate: Option<i64>,
    pub fps: Option<f64>,
    /// Untouched ffprobe document.
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize, Default)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    bit_rate: Option<String>,
    #[serde(default)]
    format_name: Option<String>,
}

#[derive(Clone)]
pub struct MediaProbe {
    ffprobe: PathBuf,
    timeout: Option<Duration>,
    executor: Arc<dyn CommandExecutor>,
}

impl std::fmt::Debug for MediaProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaProbe")
            .field("ffprobe", &self.ffprobe)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MediaProbe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
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

    pub fn program(&self) -> &Path {
        &self.ffprobe
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(path);
        debug!(command = %describe(&command), "probing media");

        let output = invoke(self.executor.as_ref(), &mut command, self.timeout)
            .await
            .map_err(|failure| match failure {
                InvocationFailure::Spawn(source) => ProbeError::Spawn {
                    program: self.ffprobe.clone(),
                    source,
                },
                InvocationFailure::TimedOut(limit) => ProbeError::Timeout(limit),
            })?;

        if !output.status.success() {
            return Err(ProbeError::Exit {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_probe_output(&output.stdout)
    }

    pub async fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        self.probe(path).await.map(|result| result.duration)
    }
}

pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeResult, ProbeError> {
    let raw: serde_json::Value = serde_json::from_slice(stdout)?;
    if !raw.is_object() {
        return Err(ProbeError::Parse("expected a JSON object".into()));
    }
    let data: FfprobeOutput = serde_json::from_value(raw.clone())?;

    let video = data
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"));

    let duration = data
        .format
        .duration
        .as_deref()
        .and_then(leading_float)
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(0.0);

    let bitrate = data
        .format
        .bit_rate
        .as_deref()
        .and_then(leading_integer)
        .map(|bits| bits / 1000)
        .filter(|kbps| *kbps > 0);

    let resolution = video
        .and_then(|stream| match (stream.width, stream.height) {
            (Some(width), Some(height)) => Some(format!("{width}x{height}")),
            _ => None,
        })
        .unwrap_or_default();

    let fps = video
        .and_then(|stream| stream.avg_frame_rate.as_deref())
        .and_then(parse_frame_rate);

    Ok(ProbeResult {
        duration,
        format: data.format.format_name.unwrap_or_default(),
        resolution,
        bitrate,
        fps,
        raw,
    })
}

/// Derives frames per second from an ffprobe `num/den` ratio, rounded to two decimals.
///
/// When the ratio has no usable denominator the numerator alone is used; a zero
/// or unparsable numerator yields `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let parts: Vec<&str> = rate.split('/').collect();
    if parts.len() == 2 {
        if let (Some(numerator), Some(denominator)) =
            (leading_integer(parts[0]), leading_integer(parts[1]))
        {
            if denominator != 0 {
                let fps = numerator as f64 / denominator as f64;
                return Some((fps * 100.0).round() / 100.0);
            }
        }
    }
    leading_integer(parts[0])
        .filter(|value| *value != 0)
        .map(|value| value as f64)
}

/// Integer prefix of `value` (optional sign, then digits), ignoring anything after it.
fn leading_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let digits_start = usize::from(trimmed.starts_with(['-', '+']));
    let digits_len = trimmed[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    trimmed[..digits_start + digits_len].parse().ok()
}

/// Decimal prefix of `value` (sign, digits, fraction, exponent), ignoring anything after it.
pub(crate) fn leading_float(value: &str) -> Option<f64> {
    let trimmed = value.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = usize::from(trimmed.starts_with(['-', '+']));
    let whole = count_digits(&bytes[end..]);
    end += whole;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = count_digits(&bytes[end + 1..]);
        if fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole == 0 && fraction == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'-' | b'+')) {
            exponent += 1;
        }
        let digits = count_digits(&bytes[exponent.min(bytes.len())..]);
        if digits > 0 {
            end = exponent + digits;
        }
    }
    trimmed[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|byte| byte.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntsc_rate_rounds_to_two_decimals() {
        assert_eq!(parse_frame_rate("30000/1001"), Some(29.97));
        assert_eq!(parse_frame_rate("24000/1001"), Some(23.98));
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
    }

    #[test]
    fn zero_or_malformed_denominator_uses_numerator() {
        assert_eq!(parse_frame_rate("25/0"), Some(25.0));
        assert_eq!(parse_frame_rate("30/abc"), Some(30.0));
        assert_eq!(parse_frame_rate("60"), Some(60.0));
        assert_eq!(parse_frame_rate("1/2/3"), Some(1.0));
    }

    #[test]
    fn unparsable_rates_yield_none() {
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc/1"), None);
        assert_eq!(parse_frame_rate(""), None);
    }

    #[test]
    fn leading_integer_matches_prefix_semantics() {
        assert_eq!(leading_integer("128000"), Some(128_000));
        assert_eq!(leading_integer(" 42abc"), Some(42));
        assert_eq!(leading_integer("-7"), Some(-7));
        assert_eq!(leading_integer("x1"), None);
    }

    #[test]
    fn leading_float_reads_decimal_prefix() {
        assert_eq!(leading_float("120.500000"), Some(120.5));
        assert_eq!(leading_float(" 50.0abc"), Some(50.0));
        assert_eq!(leading_float("-2.5e1s"), Some(-25.0));
        assert_eq!(leading_float("7.e"), Some(7.0));
        assert_eq!(leading_float(".25"), Some(0.25));
        assert_eq!(leading_float("N/A"), None);
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_float(""), None);
    }

    #[test]
    fn duration_with_trailing_garbage_keeps_numeric_prefix() {
        let payload = br#"{"streams": [], "format": {"duration": "95.25s"}}"#;
        assert_eq!(parse_probe_output(payload).unwrap().duration, 95.25);
    }

    #[test]
    fn parses_container_and_video_fields() {
        let payload = br#"{
            "streams": [
                {"codec_type": "audio", "avg_frame_rate": "0/0"},
                {"codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "120.500000", "bit_rate": "2499999", "format_name": "mov,mp4,m4a"}
        }"#;
        let result = parse_probe_output(payload).unwrap();
        assert_eq!(result.duration, 120.5);
        assert_eq!(result.format, "mov,mp4,m4a");
        assert_eq!(result.resolution, "1920x1080");
        assert_eq!(result.bitrate, Some(2499));
        assert_eq!(result.fps, Some(29.97));
        assert_eq!(result.raw["streams"][1]["width"], 1920);
    }

    #[test]
    fn audio_only_file_has_empty_resolution() {
        let payload = br#"{"streams": [{"codec_type": "audio"}], "format": {"format_name": "mp3"}}"#;
        let result = parse_probe_output(payload).unwrap();
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.resolution, "");
        assert_eq!(result.bitrate, None);
        assert_eq!(result.fps, None);
    }

    #[test]
    fn malformed_output_is_a_parse_error() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(ProbeError::Parse(_))
        ));
        assert!(matches!(
            parse_probe_output(b"[1, 2]"),
            Err(ProbeError::Parse(_))
        ));
    }
}
