use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, TransactionBehavior,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::sqlite::{format_timestamp, stored_precision, stored_precision_ceil};

use super::error::{StoreError, StoreResult};
use super::models::{
    validate_stream_settings, NewStream, StatusTransition, StreamFilter, StreamPatch,
    StreamRecord, StreamStatus, StreamWithVideo,
};
use super::videos::set_clause;
use super::SqliteStore;

const STREAM_WITH_VIDEO: &str = "SELECT s.*,
        v.title AS video_title,
        v.filepath AS video_filepath,
        v.thumbnail_path AS video_thumbnail,
        v.duration AS video_duration,
        v.resolution AS video_resolution,
        v.bitrate AS video_bitrate,
        v.fps AS video_fps
    FROM streams s
    LEFT JOIN videos v ON s.video_id = v.id";

fn bool_flag(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

impl SqliteStore {
    pub fn create_stream(&self, stream: &NewStream) -> StoreResult<StreamRecord> {
        self.create_stream_at(stream, Utc::now())
    }

    pub fn create_stream_at(
        &self,
        stream: &NewStream,
        now: DateTime<Utc>,
    ) -> StoreResult<StreamRecord> {
        let now = stored_precision(now);
        stream.validate(now)?;

        let conn = self.open()?;
        if key_in_use(&conn, &stream.stream_key, &stream.user_id, None)? {
            return Err(StoreError::StreamKeyInUse {
                stream_key: stream.stream_key.clone(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let status = stream.initial_status();
        let stamp = format_timestamp(&now);
        conn.execute(
            "INSERT INTO streams (
                id, title, video_id, rtmp_url, stream_key, platform, platform_icon,
                bitrate, resolution, fps, orientation, loop_video, schedule_time, duration,
                status, status_updated_at, use_advanced_settings, user_id, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
                ?16, ?16
            )",
            params![
                &id,
                &stream.title,
                &stream.video_id,
                &stream.rtmp_url,
                &stream.stream_key,
                &stream.platform,
                &stream.platform_icon,
                stream.bitrate,
                &stream.resolution,
                stream.fps,
                &stream.orientation,
                bool_flag(stream.loop_video),
                stream
                    .schedule_time
                    .map(|at| format_timestamp(&stored_precision(at))),
                stream.duration,
                status.as_str(),
                &stamp,
                bool_flag(stream.use_advanced_settings),
                &stream.user_id,
            ],
        )?;
        info!(stream_id = %id, status = %status, "stream created");

        let created = conn.query_row(
            "SELECT * FROM streams WHERE id = ?1",
            [&id],
            StreamRecord::from_row,
        )?;
        Ok(created)
    }

    pub fn find_stream(&self, id: &str) -> StoreResult<Option<StreamRecord>> {
        let conn = self.open()?;
        let stream = conn
            .query_row(
                "SELECT * FROM streams WHERE id = ?1",
                [id],
                StreamRecord::from_row,
            )
            .optional()?;
        Ok(stream)
    }

    pub fn find_stream_with_video(&self, id: &str) -> StoreResult<Option<StreamWithVideo>> {
        let conn = self.open()?;
        let stream = conn
            .query_row(
                &format!("{STREAM_WITH_VIDEO} WHERE s.id = ?1"),
                [id],
                StreamWithVideo::from_row,
            )
            .optional()?;
        Ok(stream)
    }

    /// Newest first, joined with the bound video's fields.
    pub fn list_streams(&self, filter: &StreamFilter) -> StoreResult<Vec<StreamWithVideo>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "{STREAM_WITH_VIDEO}
             WHERE (?1 IS NULL OR s.user_id = ?1)
               AND (?2 IS NULL OR s.status = ?2)
             ORDER BY s.created_at DESC, s.id"
        ))?;
        let streams = stmt
            .query_map(
                params![
                    filter.user_id.as_deref(),
                    filter.status.map(|status| status.as_str())
                ],
                StreamWithVideo::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(streams)
    }

    pub fn update_stream(&self, id: &str, owner: &str, patch: &StreamPatch) -> StoreResult<bool> {
        self.update_stream_at(id, owner, patch, Utc::now())
    }

    /// Applies the fields present in `patch` to a stream owned by `owner`.
    ///
    /// A new schedule time moves the stream to `scheduled`; clearing it moves a
    /// scheduled stream back to `offline`. Returns `false` when no owned row matches.
    pub fn update_stream_at(
        &self,
        id: &str,
        owner: &str,
        patch: &StreamPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        let now = stored_precision(now);
        validate_stream_settings(
            patch.bitrate.unwrap_or(1),
            patch.fps.unwrap_or(1),
            patch.resolution.as_deref(),
        )?;
        for (field, value) in [
            ("title", &patch.title),
            ("rtmp_url", &patch.rtmp_url),
            ("stream_key", &patch.stream_key),
        ] {
            if value.as_deref().is_some_and(|value| value.trim().is_empty()) {
                return Err(StoreError::Validation(format!("{field} must not be empty")));
            }
        }
        if let Some(Some(at)) = patch.schedule_time {
            if at <= now {
                return Err(StoreError::Validation(format!(
                    "schedule time {at} is not in the future"
                )));
            }
        }

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let current = tx
            .query_row(
                "SELECT * FROM streams WHERE id = ?1 AND user_id = ?2",
                [id, owner],
                StreamRecord::from_row,
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(false);
        };
        if let Some(key) = &patch.stream_key {
            if key_in_use(&tx, key, owner, Some(id))? {
                return Err(StoreError::StreamKeyInUse {
                    stream_key: key.clone(),
                });
            }
        }

        let stamp = format_timestamp(&now);
        let mut assignments: Vec<(&'static str, Value)> = Vec::new();
        let text_fields = [
            ("title", &patch.title),
            ("video_id", &patch.video_id),
            ("rtmp_url", &patch.rtmp_url),
            ("stream_key", &patch.stream_key),
            ("platform", &patch.platform),
            ("platform_icon", &patch.platform_icon),
            ("resolution", &patch.resolution),
            ("orientation", &patch.orientation),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                assignments.push((column, Value::Text(value.clone())));
            }
        }
        let integer_fields = [
            ("bitrate", patch.bitrate),
            ("fps", patch.fps),
            ("duration", patch.duration),
            ("loop_video", patch.loop_video.map(bool_flag)),
            (
                "use_advanced_settings",
                patch.use_advanced_settings.map(bool_flag),
            ),
        ];
        for (column, value) in integer_fields {
            if let Some(value) = value {
                assignments.push((column, Value::Integer(value)));
            }
        }
        match patch.schedule_time {
            Some(Some(at)) => {
                assignments.push((
                    "schedule_time",
                    Value::Text(format_timestamp(&stored_precision(at))),
                ));
                assignments.push(("status", Value::Text(StreamStatus::Scheduled.to_string())));
                assignments.push(("status_updated_at", Value::Text(stamp.clone())));
            }
            Some(None) => {
                assignments.push(("schedule_time", Value::Null));
                if current.status == StreamStatus::Scheduled {
                    assignments.push(("status", Value::Text(StreamStatus::Offline.to_string())));
                    assignments.push(("status_updated_at", Value::Text(stamp.clone())));
                }
            }
            None => {}
        }
        assignments.push(("updated_at", Value::Text(stamp)));

        let sql = format!(
            "UPDATE streams SET {} WHERE id = ?{} AND user_id = ?{}",
            set_clause(&assignments),
            assignments.len() + 1,
            assignments.len() + 2
        );
        let mut values: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
        values.push(Value::Text(id.to_string()));
        values.push(Value::Text(owner.to_string()));
        let changed = tx.execute(&sql, params_from_iter(values))?;
        tx.commit()?;
        debug!(stream_id = %id, changed, "stream updated");
        Ok(changed > 0)
    }

    pub fn delete_stream(&self, id: &str, owner: &str) -> StoreResult<bool> {
        let conn = self.open()?;
        let deleted = conn.execute(
            "DELETE FROM streams WHERE id = ?1 AND user_id = ?2",
            [id, owner],
        )?;
        Ok(deleted > 0)
    }

    pub fn is_stream_key_in_use(
        &self,
        stream_key: &str,
        owner: &str,
        exclude_id: Option<&str>,
    ) -> StoreResult<bool> {
        let conn = self.open()?;
        key_in_use(&conn, stream_key, owner, exclude_id)
    }

    /// Owner-scoped status write. Entering `live` stamps `start_time`, entering
    /// `offline` stamps `end_time`; the other timestamp is never cleared.
    pub fn update_stream_status(
        &self,
        id: &str,
        status: StreamStatus,
        owner: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<StatusTransition> {
        let at = stored_precision(at);
        let start_time = (status == StreamStatus::Live).then_some(at);
        let end_time = (status == StreamStatus::Offline).then_some(at);
        let stamp = format_timestamp(&at);

        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous_status = tx
            .query_row(
                "SELECT status FROM streams WHERE id = ?1 AND user_id = ?2",
                [id, owner],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|raw| raw.parse::<StreamStatus>())
            .transpose()?;
        let changed = tx.execute(
            "UPDATE streams SET
                status = ?1,
                status_updated_at = ?2,
                start_time = COALESCE(?3, start_time),
                end_time = COALESCE(?4, end_time),
                updated_at = ?2
             WHERE id = ?5 AND user_id = ?6",
            params![
                status.as_str(),
                &stamp,
                start_time.map(|value| format_timestamp(&value)),
                end_time.map(|value| format_timestamp(&value)),
                id,
                owner,
            ],
        )?;
        tx.commit()?;

        Ok(StatusTransition {
            id: id.to_string(),
            status,
            status_updated_at: at,
            start_time,
            end_time,
            previous_status,
            updated: changed > 0,
        })
    }

    /// Scheduled streams whose `schedule_time` lies in `[start, end]`, both ends inclusive.
    ///
    /// Bounds are narrowed to stored precision: `start` rounds up, `end` truncates.
    pub fn find_scheduled_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<StreamWithVideo>> {
        let start = stored_precision_ceil(start);
        let end = stored_precision(end);
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "{STREAM_WITH_VIDEO}
             WHERE s.status = 'scheduled'
               AND s.schedule_time IS NOT NULL
               AND s.schedule_time >= ?1
               AND s.schedule_time <= ?2"
        ))?;
        let streams = stmt
            .query_map(
                [format_timestamp(&start), format_timestamp(&end)],
                StreamWithVideo::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(streams)
    }
}

fn key_in_use(
    conn: &Connection,
    stream_key: &str,
    owner: &str,
    exclude_id: Option<&str>,
) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM streams
         WHERE stream_key = ?1 AND user_id = ?2 AND (?3 IS NULL OR id != ?3)",
        params![stream_key, owner, exclude_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
