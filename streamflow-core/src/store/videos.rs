use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::sqlite::format_timestamp;

use super::error::StoreResult;
use super::models::{validate_media_fields, NewVideo, VideoAsset, VideoPatch};
use super::SqliteStore;

const VIDEO_COLUMNS: &str = "id, title, filepath, thumbnail_path, file_size, duration, format, \
    resolution, bitrate, fps, user_id, created_at, updated_at";

impl SqliteStore {
    pub fn create_video(&self, video: &NewVideo) -> StoreResult<VideoAsset> {
        video.validate()?;
        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(&Utc::now());
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO videos (
                id, title, filepath, thumbnail_path, file_size, duration, format,
                resolution, bitrate, fps, user_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                &id,
                &video.title,
                &video.filepath,
                &video.thumbnail_path,
                video.file_size,
                video.duration,
                &video.format,
                video.resolution.as_deref().filter(|value| !value.is_empty()),
                video.bitrate,
                video.fps,
                &video.user_id,
                &now,
            ],
        )?;
        debug!(video_id = %id, user_id = %video.user_id, "video registered");
        let created = conn.query_row(
            &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
            [&id],
            VideoAsset::from_row,
        )?;
        Ok(created)
    }

    pub fn find_video(&self, id: &str) -> StoreResult<Option<VideoAsset>> {
        let conn = self.open()?;
        let video = conn
            .query_row(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                [id],
                VideoAsset::from_row,
            )
            .optional()?;
        Ok(video)
    }

    /// Newest first; `None` lists every owner's videos.
    pub fn list_videos(&self, user_id: Option<&str>) -> StoreResult<Vec<VideoAsset>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE (?1 IS NULL OR user_id = ?1)
             ORDER BY created_at DESC, id"
        ))?;
        let videos = stmt
            .query_map([user_id], VideoAsset::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(videos)
    }

    pub fn update_video(&self, id: &str, patch: &VideoPatch) -> StoreResult<bool> {
        validate_media_fields(patch.duration, patch.resolution.as_deref(), patch.bitrate)?;
        if patch.is_empty() {
            return Ok(false);
        }

        let mut assignments: Vec<(&'static str, Value)> = Vec::new();
        if let Some(title) = &patch.title {
            assignments.push(("title", Value::Text(title.clone())));
        }
        if let Some(filepath) = &patch.filepath {
            assignments.push(("filepath", Value::Text(filepath.clone())));
        }
        if let Some(thumbnail) = &patch.thumbnail_path {
            assignments.push(("thumbnail_path", Value::Text(thumbnail.clone())));
        }
        if let Some(size) = patch.file_size {
            assignments.push(("file_size", Value::Integer(size)));
        }
        if let Some(duration) = patch.duration {
            assignments.push(("duration", Value::Real(duration)));
        }
        if let Some(format) = &patch.format {
            assignments.push(("format", Value::Text(format.clone())));
        }
        if let Some(resolution) = &patch.resolution {
            assignments.push(("resolution", Value::Text(resolution.clone())));
        }
        if let Some(bitrate) = patch.bitrate {
            assignments.push(("bitrate", Value::Integer(bitrate)));
        }
        if let Some(fps) = patch.fps {
            assignments.push(("fps", Value::Real(fps)));
        }
        assignments.push(("updated_at", Value::Text(format_timestamp(&Utc::now()))));

        let sql = format!(
            "UPDATE videos SET {} WHERE id = ?{}",
            set_clause(&assignments),
            assignments.len() + 1
        );
        let mut values: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
        values.push(Value::Text(id.to_string()));

        let conn = self.open()?;
        let changed = conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    /// Removes the row and returns what was stored so callers can clean up files.
    pub fn delete_video(&self, id: &str) -> StoreResult<Option<VideoAsset>> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                [id],
                VideoAsset::from_row,
            )
            .optional()?;
        if existing.is_some() {
            tx.execute("DELETE FROM videos WHERE id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(existing)
    }
}

/// `col1 = ?1, col2 = ?2, ...` over fixed column names.
pub(crate) fn set_clause(assignments: &[(&'static str, Value)]) -> String {
    assignments
        .iter()
        .enumerate()
        .map(|(index, (column, _))| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ")
}
