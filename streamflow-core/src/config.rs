use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::media::{MediaTools, SeekTimestamp, ThumbnailOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamflowConfig {
    pub paths: PathsSection,
    #[serde(default)]
    pub media: MediaSection,
    #[serde(default)]
    pub thumbnail: ThumbnailSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub sessions: SessionsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl StreamflowConfig {
    /// Relative paths are taken from `paths.media_root`.
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.media_root).join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.paths.data_dir).join(&self.paths.database)
    }

    pub fn sessions_database_path(&self) -> PathBuf {
        Path::new(&self.paths.data_dir).join(&self.paths.sessions_database)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.thumbnails_dir)
    }

    pub fn media_tools(&self) -> MediaTools {
        let discovered = MediaTools::discover();
        MediaTools {
            ffprobe: non_empty(&self.media.ffprobe).unwrap_or(discovered.ffprobe),
            ffmpeg: non_empty(&self.media.ffmpeg).unwrap_or(discovered.ffmpeg),
        }
    }

    pub fn thumbnail_options(&self) -> ConfigResult<ThumbnailOptions> {
        let timestamp: SeekTimestamp =
            self.thumbnail
                .timestamp
                .parse()
                .map_err(|reason: String| ConfigError::Invalid {
                    field: "thumbnail.timestamp",
                    reason,
                })?;
        Ok(ThumbnailOptions {
            timestamp,
            size: self.thumbnail.size.clone(),
            quality: self.thumbnail.quality,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let size_ok = self
            .thumbnail
            .size
            .split_once('x')
            .map(|(w, h)| w.parse::<u32>().is_ok() && h.parse::<u32>().is_ok())
            .unwrap_or(false);
        if !size_ok {
            return Err(ConfigError::Invalid {
                field: "thumbnail.size",
                reason: format!("expected WxH, got {:?}", self.thumbnail.size),
            });
        }
        if self.sessions.ttl_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "sessions.ttl_seconds",
                reason: "must be greater than zero".into(),
            });
        }
        if self.sessions.sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "sessions.sweep_interval_seconds",
                reason: "must be greater than zero".into(),
            });
        }
        self.thumbnail_options().map(|_| ())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub data_dir: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_sessions_database")]
    pub sessions_database: String,
    pub media_root: String,
    #[serde(default = "default_thumbnails_dir")]
    pub thumbnails_dir: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MediaSection {
    #[serde(default)]
    pub ffprobe: String,
    #[serde(default)]
    pub ffmpeg: String,
    /// Zero leaves the tool unbounded.
    #[serde(default)]
    pub probe_timeout_seconds: u64,
    #[serde(default)]
    pub thumbnail_timeout_seconds: u64,
}

impl MediaSection {
    pub fn probe_timeout(&self) -> Option<Duration> {
        seconds(self.probe_timeout_seconds)
    }

    pub fn thumbnail_timeout(&self) -> Option<Duration> {
        seconds(self.thumbnail_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailSection {
    #[serde(default = "default_ingest_timestamp")]
    pub timestamp: String,
    #[serde(default = "default_thumbnail_size")]
    pub size: String,
    #[serde(default = "default_thumbnail_quality")]
    pub quality: u32,
    #[serde(default)]
    pub required: bool,
}

impl Default for ThumbnailSection {
    fn default() -> Self {
        Self {
            timestamp: default_ingest_timestamp(),
            size: default_thumbnail_size(),
            quality: default_thumbnail_quality(),
            required: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsSection {
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl SessionsSection {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_database() -> String {
    "streamflow.sqlite".into()
}

fn default_sessions_database() -> String {
    "sessions.sqlite".into()
}

fn default_thumbnails_dir() -> String {
    "uploads/thumbnails".into()
}

fn default_ingest_timestamp() -> String {
    "10".into()
}

fn default_thumbnail_size() -> String {
    "854x480".into()
}

fn default_thumbnail_quality() -> u32 {
    2
}

fn default_window_seconds() -> u64 {
    60
}

fn default_session_ttl() -> u64 {
    86_400
}

fn default_sweep_interval() -> u64 {
    3_600
}

fn default_log_level() -> String {
    "info".into()
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

fn non_empty(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

pub fn load_streamflow_config<P: AsRef<Path>>(path: P) -> ConfigResult<StreamflowConfig> {
    let config: StreamflowConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> ConfigResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/streamflow.toml");
        let config = load_streamflow_config(path).expect("config should parse");
        assert_eq!(config.paths.database, "streamflow.sqlite");
        assert_eq!(config.thumbnail.size, "854x480");
        assert_eq!(config.media.probe_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.scheduler.window_seconds, 60);
        assert_eq!(
            config.thumbnail_options().unwrap().timestamp,
            SeekTimestamp::Absolute("10".into())
        );
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: StreamflowConfig = toml::from_str(
            "[paths]\ndata_dir = \"/var/lib/streamflow\"\nmedia_root = \"/srv/public\"\n",
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.media.probe_timeout(), None);
        assert_eq!(config.sessions.ttl_seconds, 86_400);
        assert_eq!(config.sessions.sweep_interval(), Duration::from_secs(3_600));
        assert_eq!(
            config.resolve_path("uploads/a.mp4"),
            PathBuf::from("/srv/public/uploads/a.mp4")
        );
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/streamflow/streamflow.sqlite")
        );
    }

    #[test]
    fn rejects_malformed_thumbnail_size() {
        let config: StreamflowConfig = toml::from_str(
            "[paths]\ndata_dir = \"d\"\nmedia_root = \"m\"\n[thumbnail]\nsize = \"large\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "thumbnail.size",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let config: StreamflowConfig = toml::from_str(
            "[paths]\ndata_dir = \"d\"\nmedia_root = \"m\"\n[sessions]\nsweep_interval_seconds = 0\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "sessions.sweep_interval_seconds",
                ..
            })
        ));
    }
}
