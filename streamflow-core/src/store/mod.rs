//! SQLite record store for videos, streams and their run history.

mod error;
mod history;
mod migrations;
mod models;
mod streams;
mod videos;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::sqlite::configure_connection;

pub use error::{StoreError, StoreResult};
pub use migrations::{apply_migrations, current_version, Applicability, Migration, MIGRATIONS};
pub use models::{
    NewStream, NewVideo, StatusTransition, StreamFilter, StreamHistoryEntry, StreamPatch,
    StreamRecord, StreamStatus, StreamWithVideo, VideoAsset, VideoPatch, VideoSummary,
};

#[derive(Debug, Clone)]
pub struct SqliteStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<SqliteStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteStore { path, flags })
    }
}

/// Handle to the record database. Cheap to clone; each operation opens its own connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteStore {
    pub fn builder() -> SqliteStoreBuilder {
        SqliteStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqliteStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn open(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub fn initialize(&self) -> StoreResult<Vec<u32>> {
        let mut conn = self.open()?;
        apply_migrations(&mut conn, MIGRATIONS)
    }

    pub fn schema_version(&self) -> StoreResult<u32> {
        let conn = self.open()?;
        current_version(&conn)
    }
}
