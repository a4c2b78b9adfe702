//! Login session persistence.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::sqlite::configure_connection;

const SESSION_SCHEMA: &str = include_str!("../../sql/sessions.sql");

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open session database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("session database error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("session document is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Keyed storage for session documents with expiry.
pub trait SessionStore: Send + Sync {
    /// The stored document, unless missing or expired.
    fn get(&self, sid: &str) -> SessionResult<Option<Value>>;
    fn set(&self, sid: &str, session: &Value) -> SessionResult<()>;
    fn destroy(&self, sid: &str) -> SessionResult<()>;
    fn clear(&self) -> SessionResult<()>;
    /// Number of live (unexpired) sessions.
    fn count(&self) -> SessionResult<u64>;
    /// Deletes expired sessions and returns how many went.
    fn sweep_expired(&self) -> SessionResult<u64>;
}

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    path: PathBuf,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(path: impl AsRef<Path>, ttl: Duration) -> SessionResult<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            ttl,
        };
        store.open()?.execute_batch(SESSION_SCHEMA)?;
        Ok(store)
    }

    fn open(&self) -> SessionResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(|source| {
            SessionError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| SessionError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    /// Expiry in epoch milliseconds: `cookie.maxAge` when positive, the store TTL otherwise.
    pub fn expiry_for(&self, session: &Value, now_ms: i64) -> i64 {
        let max_age = session
            .get("cookie")
            .and_then(|cookie| cookie.get("maxAge"))
            .and_then(Value::as_f64)
            .filter(|max_age| *max_age > 0.0)
            .map(|max_age| max_age as i64);
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_add(max_age.unwrap_or(ttl_ms))
    }

    pub fn get_at(&self, sid: &str, now_ms: i64) -> SessionResult<Option<Value>> {
        let conn = self.open()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT sess FROM sessions WHERE sid = ?1 AND expired > ?2",
                params![sid, now_ms],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(SessionError::from))
            .transpose()
    }

    pub fn set_at(&self, sid: &str, session: &Value, now_ms: i64) -> SessionResult<()> {
        let expired = self.expiry_for(session, now_ms);
        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (sid, sess, expired) VALUES (?1, ?2, ?3)",
            params![sid, serde_json::to_string(session)?, expired],
        )?;
        Ok(())
    }

    pub fn count_at(&self, now_ms: i64) -> SessionResult<u64> {
        let conn = self.open()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE expired > ?1",
            [now_ms],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    pub fn sweep_expired_at(&self, now_ms: i64) -> SessionResult<u64> {
        let conn = self.open()?;
        let removed = conn.execute("DELETE FROM sessions WHERE expired <= ?1", [now_ms])?;
        Ok(removed as u64)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, sid: &str) -> SessionResult<Option<Value>> {
        self.get_at(sid, now_ms())
    }

    fn set(&self, sid: &str, session: &Value) -> SessionResult<()> {
        self.set_at(sid, session, now_ms())
    }

    fn destroy(&self, sid: &str) -> SessionResult<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM sessions WHERE sid = ?1", [sid])?;
        Ok(())
    }

    fn clear(&self) -> SessionResult<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM sessions", [])?;
        Ok(())
    }

    fn count(&self) -> SessionResult<u64> {
        self.count_at(now_ms())
    }

    fn sweep_expired(&self) -> SessionResult<u64> {
        self.sweep_expired_at(now_ms())
    }
}

/// Sweeps expired sessions every `every` until the handle is aborted.
pub fn spawn_session_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.sweep_expired() {
                Ok(removed) => info!(removed, "swept expired sessions"),
                Err(err) => warn!(error = %err, "session sweep failed"),
            }
        }
    })
}
