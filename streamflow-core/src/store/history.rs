use chrono::Utc;
use rusqlite::params;

use crate::sqlite::format_timestamp;

use super::error::StoreResult;
use super::models::StreamHistoryEntry;
use super::SqliteStore;

impl SqliteStore {
    pub fn record_history(&self, entry: &StreamHistoryEntry) -> StoreResult<StreamHistoryEntry> {
        let created_at = entry.created_at.unwrap_or_else(Utc::now);
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO stream_history (
                id, stream_id, title, platform, platform_icon, video_id, video_title,
                resolution, bitrate, fps, start_time, end_time, duration,
                use_advanced_settings, stream_key, rtmp_url, user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                &entry.id,
                &entry.stream_id,
                &entry.title,
                &entry.platform,
                &entry.platform_icon,
                &entry.video_id,
                &entry.video_title,
                &entry.resolution,
                entry.bitrate,
                entry.fps,
                entry.start_time.map(|value| format_timestamp(&value)),
                entry.end_time.map(|value| format_timestamp(&value)),
                entry.duration,
                i64::from(entry.use_advanced_settings),
                &entry.stream_key,
                &entry.rtmp_url,
                &entry.user_id,
                format_timestamp(&created_at),
            ],
        )?;
        let stored = conn.query_row(
            "SELECT * FROM stream_history WHERE id = ?1",
            [&entry.id],
            StreamHistoryEntry::from_row,
        )?;
        Ok(stored)
    }

    /// Most recent runs first.
    pub fn list_history(&self, owner: &str, limit: usize) -> StoreResult<Vec<StreamHistoryEntry>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM stream_history
             WHERE user_id = ?1
             ORDER BY created_at DESC, id
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(
                params![owner, limit as i64],
                StreamHistoryEntry::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
