pub mod config;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod media;
pub mod schedule;
pub mod session;
pub mod sqlite;
pub mod store;

pub use config::{load_streamflow_config, StreamflowConfig};
pub use error::{ConfigError, ConfigResult};
pub use ingest::{IngestError, IngestOutcome, IngestRequest, IngestResult, VideoIngestor};
pub use lifecycle::{CompletedRun, LifecycleEngine};
pub use media::{
    CommandExecutor, MediaProbe, MediaTools, ProbeError, ProbeResult, SeekTimestamp,
    SystemCommandExecutor, ThumbnailError, ThumbnailGenerator, ThumbnailOptions,
};
pub use schedule::ScheduleResolver;
pub use session::{
    spawn_session_sweeper, SessionError, SessionResult, SessionStore, SqliteSessionStore,
};
pub use store::{
    NewStream, NewVideo, SqliteStore, SqliteStoreBuilder, StatusTransition, StoreError,
    StoreResult, StreamFilter, StreamHistoryEntry, StreamPatch, StreamRecord, StreamStatus,
    StreamWithVideo, VideoAsset, VideoPatch,
};
