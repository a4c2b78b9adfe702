//! Window queries over scheduled streams.
//!
//! The polling loop lives with the caller; this module only answers which
//! streams are due inside a time window.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::store::{SqliteStore, StoreError, StoreResult, StreamWithVideo};

#[derive(Debug, Clone)]
pub struct ScheduleResolver {
    store: SqliteStore,
}

impl ScheduleResolver {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Scheduled streams with `start <= schedule_time <= end`.
    pub fn find_due_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<StreamWithVideo>> {
        if end < start {
            return Err(StoreError::Validation(format!(
                "window end {end} precedes start {start}"
            )));
        }
        let due = self.store.find_scheduled_in_range(start, end)?;
        debug!(%start, %end, due = due.len(), "resolved scheduled streams");
        Ok(due)
    }

    /// Streams due within `half_width` either side of `now`.
    pub fn due_around(
        &self,
        now: DateTime<Utc>,
        half_width: Duration,
    ) -> StoreResult<Vec<StreamWithVideo>> {
        let half_width = half_width.abs();
        self.find_due_in_range(now - half_width, now + half_width)
    }
}
