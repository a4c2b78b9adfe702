use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{
    SqliteStore, StatusTransition, StoreResult, StreamHistoryEntry, StreamStatus,
};

/// Drives streams between `offline`, `scheduled` and `live`.
///
/// Any status may follow any other; the caller owns ordering.
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    store: SqliteStore,
}

/// Result of ending a run: the status write plus the history row, if one was recorded.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub transition: StatusTransition,
    pub history: Option<StreamHistoryEntry>,
}

impl LifecycleEngine {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub fn set_status(
        &self,
        stream_id: &str,
        status: StreamStatus,
        owner: &str,
    ) -> StoreResult<StatusTransition> {
        self.set_status_at(stream_id, status, owner, Utc::now())
    }

    pub fn set_status_at(
        &self,
        stream_id: &str,
        status: StreamStatus,
        owner: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<StatusTransition> {
        let transition = self.store.update_stream_status(stream_id, status, owner, at)?;
        if transition.updated {
            info!(stream_id, %status, "stream status changed");
        } else {
            warn!(stream_id, owner, %status, "status change matched no stream");
        }
        Ok(transition)
    }

    pub fn complete_run(&self, stream_id: &str, owner: &str) -> StoreResult<CompletedRun> {
        self.complete_run_at(stream_id, owner, Utc::now())
    }

    /// Moves the stream offline and appends a history row when it was live.
    ///
    /// Completing a stream that is already offline records nothing, so a
    /// repeated completion cannot add a second run.
    pub fn complete_run_at(
        &self,
        stream_id: &str,
        owner: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<CompletedRun> {
        let transition = self.set_status_at(stream_id, StreamStatus::Offline, owner, at)?;
        if !transition.updated || transition.previous_status != Some(StreamStatus::Live) {
            return Ok(CompletedRun {
                transition,
                history: None,
            });
        }

        let history = match self.store.find_stream_with_video(stream_id)? {
            Some(run) => match StreamHistoryEntry::from_completed_run(&run, Uuid::new_v4().to_string())
            {
                Some(entry) => {
                    let stored = self.store.record_history(&entry)?;
                    info!(
                        stream_id,
                        duration_seconds = stored.duration.unwrap_or_default(),
                        "run recorded in history"
                    );
                    Some(stored)
                }
                None => None,
            },
            None => None,
        };
        Ok(CompletedRun {
            transition,
            history,
        })
    }
}
