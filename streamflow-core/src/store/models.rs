use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::sqlite::parse_timestamp;

use super::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Offline,
    Scheduled,
    Live,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Offline => "offline",
            StreamStatus::Scheduled => "scheduled",
            StreamStatus::Live => "live",
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(StreamStatus::Offline),
            "scheduled" => Ok(StreamStatus::Scheduled),
            "live" => Ok(StreamStatus::Live),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

fn resolution_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+x\d+$").expect("valid regex"))
}

pub(crate) fn validate_media_fields(
    duration: Option<f64>,
    resolution: Option<&str>,
    bitrate: Option<i64>,
) -> StoreResult<()> {
    if let Some(duration) = duration {
        if !duration.is_finite() || duration < 0.0 {
            return Err(StoreError::Validation(format!(
                "duration must be >= 0, got {duration}"
            )));
        }
    }
    if let Some(resolution) = resolution.filter(|value| !value.is_empty()) {
        if !resolution_pattern().is_match(resolution) {
            return Err(StoreError::Validation(format!(
                "resolution must look like WxH, got {resolution:?}"
            )));
        }
    }
    if let Some(bitrate) = bitrate {
        if bitrate <= 0 {
            return Err(StoreError::Validation(format!(
                "bitrate must be positive, got {bitrate}"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoAsset {
    pub id: String,
    pub title: String,
    pub filepath: String,
    pub thumbnail_path: Option<String>,
    pub file_size: Option<i64>,
    pub duration: f64,
    pub format: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<i64>,
    pub fps: Option<f64>,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl VideoAsset {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            filepath: row.get("filepath")?,
            thumbnail_path: row.get("thumbnail_path")?,
            file_size: row.get("file_size")?,
            duration: row.get::<_, Option<f64>>("duration")?.unwrap_or(0.0),
            format: row.get("format")?,
            resolution: row.get("resolution")?,
            bitrate: row.get("bitrate")?,
            fps: row.get("fps")?,
            user_id: row.get("user_id")?,
            created_at: parse_timestamp(row.get("created_at")?),
            updated_at: parse_timestamp(row.get("updated_at")?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewVideo {
    pub title: String,
    pub filepath: String,
    pub thumbnail_path: Option<String>,
    pub file_size: Option<i64>,
    pub duration: f64,
    pub format: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<i64>,
    pub fps: Option<f64>,
    pub user_id: String,
}

impl NewVideo {
    pub fn validate(&self) -> StoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(StoreError::Validation("video title is required".into()));
        }
        if self.filepath.trim().is_empty() {
            return Err(StoreError::Validation("video filepath is required".into()));
        }
        validate_media_fields(
            Some(self.duration),
            self.resolution.as_deref(),
            self.bitrate,
        )
    }
}

/// Editable video fields; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub filepath: Option<String>,
    pub thumbnail_path: Option<String>,
    pub file_size: Option<i64>,
    pub duration: Option<f64>,
    pub format: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<i64>,
    pub fps: Option<f64>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        *self == VideoPatch::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamRecord {
    pub id: String,
    pub title: String,
    pub video_id: Option<String>,
    pub rtmp_url: String,
    pub stream_key: String,
    pub platform: Option<String>,
    pub platform_icon: Option<String>,
    pub bitrate: i64,
    pub resolution: Option<String>,
    pub fps: i64,
    pub orientation: String,
    pub loop_video: bool,
    pub schedule_time: Option<DateTime<Utc>>,
    /// Run cap in minutes.
    pub duration: Option<i64>,
    pub status: StreamStatus,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub use_advanced_settings: bool,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StreamRecord {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            video_id: row.get("video_id")?,
            rtmp_url: row.get("rtmp_url")?,
            stream_key: row.get("stream_key")?,
            platform: row.get("platform")?,
            platform_icon: row.get("platform_icon")?,
            bitrate: row.get::<_, Option<i64>>("bitrate")?.unwrap_or(2500),
            resolution: row.get("resolution")?,
            fps: row.get::<_, Option<i64>>("fps")?.unwrap_or(30),
            orientation: row
                .get::<_, Option<String>>("orientation")?
                .unwrap_or_else(|| "horizontal".to_string()),
            loop_video: row.get::<_, Option<i64>>("loop_video")?.unwrap_or(1) == 1,
            schedule_time: parse_timestamp(row.get("schedule_time")?),
            duration: row.get("duration")?,
            status: row
                .get::<_, Option<String>>("status")?
                .and_then(|value| value.parse().ok())
                .unwrap_or(StreamStatus::Offline),
            status_updated_at: parse_timestamp(row.get("status_updated_at")?),
            start_time: parse_timestamp(row.get("start_time")?),
            end_time: parse_timestamp(row.get("end_time")?),
            use_advanced_settings: row
                .get::<_, Option<i64>>("use_advanced_settings")?
                .unwrap_or(0)
                == 1,
            user_id: row.get("user_id")?,
            created_at: parse_timestamp(row.get("created_at")?),
            updated_at: parse_timestamp(row.get("updated_at")?),
        })
    }
}

/// Video columns denormalized onto a stream by the joined queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoSummary {
    pub title: String,
    pub filepath: String,
    pub thumbnail_path: Option<String>,
    pub duration: Option<f64>,
    pub resolution: Option<String>,
    pub bitrate: Option<i64>,
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamWithVideo {
    #[serde(flatten)]
    pub stream: StreamRecord,
    pub video: Option<VideoSummary>,
}

impl StreamWithVideo {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let stream = StreamRecord::from_row(row)?;
        let video_title: Option<String> = row.get("video_title")?;
        let video_filepath: Option<String> = row.get("video_filepath")?;
        let video = match (video_title, video_filepath) {
            (Some(title), Some(filepath)) => Some(VideoSummary {
                title,
                filepath,
                thumbnail_path: row.get("video_thumbnail")?,
                duration: row.get("video_duration")?,
                resolution: row.get("video_resolution")?,
                bitrate: row.get("video_bitrate")?,
                fps: row.get("video_fps")?,
            }),
            _ => None,
        };
        Ok(Self { stream, video })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStream {
    pub title: String,
    pub video_id: Option<String>,
    pub rtmp_url: String,
    pub stream_key: String,
    pub platform: Option<String>,
    pub platform_icon: Option<String>,
    pub bitrate: i64,
    pub resolution: Option<String>,
    pub fps: i64,
    pub orientation: String,
    pub loop_video: bool,
    pub schedule_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub use_advanced_settings: bool,
    pub user_id: String,
}

impl NewStream {
    pub fn new(
        title: impl Into<String>,
        rtmp_url: impl Into<String>,
        stream_key: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            video_id: None,
            rtmp_url: rtmp_url.into(),
            stream_key: stream_key.into(),
            platform: None,
            platform_icon: None,
            bitrate: 2500,
            resolution: None,
            fps: 30,
            orientation: "horizontal".to_string(),
            loop_video: true,
            schedule_time: None,
            duration: None,
            use_advanced_settings: false,
            user_id: user_id.into(),
        }
    }

    pub fn initial_status(&self) -> StreamStatus {
        if self.schedule_time.is_some() {
            StreamStatus::Scheduled
        } else {
            StreamStatus::Offline
        }
    }

    pub fn validate(&self, now: DateTime<Utc>) -> StoreResult<()> {
        for (field, value) in [
            ("title", &self.title),
            ("rtmp_url", &self.rtmp_url),
            ("stream_key", &self.stream_key),
            ("user_id", &self.user_id),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Validation(format!("{field} is required")));
            }
        }
        if let Some(at) = self.schedule_time {
            if at <= now {
                return Err(StoreError::Validation(format!(
                    "schedule time {at} is not in the future"
                )));
            }
        }
        validate_stream_settings(self.bitrate, self.fps, self.resolution.as_deref())
    }
}

pub(crate) fn validate_stream_settings(
    bitrate: i64,
    fps: i64,
    resolution: Option<&str>,
) -> StoreResult<()> {
    if bitrate <= 0 {
        return Err(StoreError::Validation(format!(
            "bitrate must be positive, got {bitrate}"
        )));
    }
    if fps <= 0 {
        return Err(StoreError::Validation(format!(
            "fps must be positive, got {fps}"
        )));
    }
    validate_media_fields(None, resolution, None)
}

/// Editable stream fields. Column names are fixed here, never taken from callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamPatch {
    pub title: Option<String>,
    pub video_id: Option<String>,
    pub rtmp_url: Option<String>,
    pub stream_key: Option<String>,
    pub platform: Option<String>,
    pub platform_icon: Option<String>,
    pub bitrate: Option<i64>,
    pub resolution: Option<String>,
    pub fps: Option<i64>,
    pub orientation: Option<String>,
    pub loop_video: Option<bool>,
    /// `Some(Some(t))` reschedules, `Some(None)` clears the schedule.
    pub schedule_time: Option<Option<DateTime<Utc>>>,
    pub duration: Option<i64>,
    pub use_advanced_settings: Option<bool>,
}

impl StreamPatch {
    pub fn is_empty(&self) -> bool {
        *self == StreamPatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamFilter {
    pub user_id: Option<String>,
    pub status: Option<StreamStatus>,
}

/// Outcome of a status change: the timestamps that were written and whether a row matched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusTransition {
    pub id: String,
    pub status: StreamStatus,
    pub status_updated_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Status the row held before the write; `None` when no row matched.
    pub previous_status: Option<StreamStatus>,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamHistoryEntry {
    pub id: String,
    pub stream_id: Option<String>,
    pub title: String,
    pub platform: Option<String>,
    pub platform_icon: Option<String>,
    pub video_id: Option<String>,
    pub video_title: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<i64>,
    pub fps: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between start and end.
    pub duration: Option<i64>,
    pub use_advanced_settings: bool,
    pub stream_key: Option<String>,
    pub rtmp_url: Option<String>,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl StreamHistoryEntry {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            stream_id: row.get("stream_id")?,
            title: row.get("title")?,
            platform: row.get("platform")?,
            platform_icon: row.get("platform_icon")?,
            video_id: row.get("video_id")?,
            video_title: row.get("video_title")?,
            resolution: row.get("resolution")?,
            bitrate: row.get("bitrate")?,
            fps: row.get("fps")?,
            start_time: parse_timestamp(row.get("start_time")?),
            end_time: parse_timestamp(row.get("end_time")?),
            duration: row.get("duration")?,
            use_advanced_settings: row
                .get::<_, Option<i64>>("use_advanced_settings")?
                .unwrap_or(0)
                == 1,
            stream_key: row.get("stream_key")?,
            rtmp_url: row.get("rtmp_url")?,
            user_id: row.get("user_id")?,
            created_at: parse_timestamp(row.get("created_at")?),
        })
    }

    /// Snapshot of a finished run; `None` when the stream never went live.
    pub fn from_completed_run(run: &StreamWithVideo, id: impl Into<String>) -> Option<Self> {
        let stream = &run.stream;
        let start = stream.start_time?;
        let end = stream.end_time.filter(|end| *end >= start)?;
        Some(Self {
            id: id.into(),
            stream_id: Some(stream.id.clone()),
            title: stream.title.clone(),
            platform: stream.platform.clone(),
            platform_icon: stream.platform_icon.clone(),
            video_id: stream.video_id.clone(),
            video_title: run.video.as_ref().map(|video| video.title.clone()),
            resolution: stream.resolution.clone(),
            bitrate: Some(stream.bitrate),
            fps: Some(stream.fps),
            start_time: Some(start),
            end_time: Some(end),
            duration: Some((end - start).num_seconds()),
            use_advanced_settings: stream.use_advanced_settings,
            stream_key: Some(stream.stream_key.clone()),
            rtmp_url: Some(stream.rtmp_url.clone()),
            user_id: stream.user_id.clone(),
            created_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            StreamStatus::Offline,
            StreamStatus::Scheduled,
            StreamStatus::Live,
        ] {
            assert_eq!(status.as_str().parse::<StreamStatus>().unwrap(), status);
        }
        assert!(matches!(
            "paused".parse::<StreamStatus>(),
            Err(StoreError::InvalidStatus(_))
        ));
    }

    #[test]
    fn media_field_invariants() {
        assert!(validate_media_fields(Some(0.0), Some("1280x720"), Some(1)).is_ok());
        assert!(validate_media_fields(Some(12.0), Some(""), None).is_ok());
        assert!(validate_media_fields(Some(-1.0), None, None).is_err());
        assert!(validate_media_fields(None, Some("720p"), None).is_err());
        assert!(validate_media_fields(None, Some("1280x720x3"), None).is_err());
        assert!(validate_media_fields(None, None, Some(0)).is_err());
    }

    #[test]
    fn new_stream_status_follows_schedule() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut stream = NewStream::new("Show", "rtmp://a.rtmp.youtube.com/live2", "key", "u1");
        assert_eq!(stream.initial_status(), StreamStatus::Offline);
        assert!(stream.validate(now).is_ok());

        stream.schedule_time = Some(now + Duration::minutes(5));
        assert_eq!(stream.initial_status(), StreamStatus::Scheduled);
        assert!(stream.validate(now).is_ok());

        stream.schedule_time = Some(now);
        assert!(stream.validate(now).is_err());
    }

    #[test]
    fn history_snapshot_requires_a_finished_run() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut stream = StreamRecord {
            id: "s1".into(),
            title: "Show".into(),
            video_id: Some("v1".into()),
            rtmp_url: "rtmp://example/live".into(),
            stream_key: "key".into(),
            platform: Some("YouTube".into()),
            platform_icon: None,
            bitrate: 4000,
            resolution: Some("1920x1080".into()),
            fps: 30,
            orientation: "horizontal".into(),
            loop_video: true,
            schedule_time: None,
            duration: None,
            status: StreamStatus::Offline,
            status_updated_at: None,
            start_time: Some(start),
            end_time: None,
            use_advanced_settings: true,
            user_id: "u1".into(),
            created_at: None,
            updated_at: None,
        };
        let run = StreamWithVideo {
            stream: stream.clone(),
            video: None,
        };
        assert!(StreamHistoryEntry::from_completed_run(&run, "h1").is_none());

        stream.end_time = Some(start + Duration::seconds(95));
        let run = StreamWithVideo {
            stream,
            video: None,
        };
        let entry = StreamHistoryEntry::from_completed_run(&run, "h1").unwrap();
        assert_eq!(entry.duration, Some(95));
        assert_eq!(entry.stream_id.as_deref(), Some("s1"));
        assert!(entry.use_advanced_settings);
    }
}
