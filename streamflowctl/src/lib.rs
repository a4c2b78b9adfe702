use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use streamflow_core::{
    load_streamflow_config, spawn_session_sweeper, CommandExecutor, CompletedRun, IngestRequest,
    LifecycleEngine, MediaProbe, NewStream, ProbeResult, ScheduleResolver, SeekTimestamp,
    SessionStore, SqliteSessionStore, SqliteStore, StatusTransition, StreamFilter,
    StreamHistoryEntry, StreamStatus, StreamWithVideo, StreamflowConfig, SystemCommandExecutor,
    ThumbnailGenerator, ThumbnailOptions, VideoAsset, VideoIngestor,
};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] streamflow_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("store error: {0}")]
    Store(#[from] streamflow_core::StoreError),
    #[error("probe error: {0}")]
    Probe(#[from] streamflow_core::ProbeError),
    #[error("thumbnail error: {0}")]
    Thumbnail(#[from] streamflow_core::ThumbnailError),
    #[error("ingest error: {0}")]
    Ingest(#[from] streamflow_core::IngestError),
    #[error("session error: {0}")]
    Session(#[from] streamflow_core::SessionError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Streamflow media and stream lifecycle control", long_about = None)]
pub struct Cli {
    /// Path to streamflow.toml
    #[arg(long, default_value = "configs/streamflow.toml")]
    pub config: PathBuf,
    /// Overrides the record database location
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Overrides the session database location
    #[arg(long)]
    pub sessions_database: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Applies pending schema migrations
    Init,
    /// Prints normalized metadata for a media file
    Probe(ProbeArgs),
    /// Extracts a preview frame from a video
    Thumbnail(ThumbnailArgs),
    /// Video asset operations
    #[command(subcommand)]
    Video(VideoCommands),
    /// Stream operations
    #[command(subcommand)]
    Stream(StreamCommands),
    /// Session store maintenance
    #[command(subcommand)]
    Sessions(SessionCommands),
    /// Prints a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    pub file: PathBuf,
    /// Include the untouched ffprobe document
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct ThumbnailArgs {
    pub video: PathBuf,
    pub output: PathBuf,
    /// Seconds, a timecode, or a percentage such as `25%`
    #[arg(long)]
    pub timestamp: Option<String>,
    #[arg(long)]
    pub size: Option<String>,
    #[arg(long)]
    pub quality: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum VideoCommands {
    /// Probes a file and registers it
    Add(VideoAddArgs),
    /// Lists registered videos
    List {
        #[arg(long)]
        user: Option<String>,
    },
    /// Deletes a video record and its files
    Remove { id: String },
}

#[derive(Args, Debug)]
pub struct VideoAddArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub user: String,
    /// File name for the thumbnail inside the thumbnails directory
    #[arg(long)]
    pub thumbnail_name: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum StreamCommands {
    /// Creates a stream, scheduled when `--schedule` is given
    Create(StreamCreateArgs),
    /// Lists streams with their video
    List(StreamListArgs),
    /// Sets the status of a stream
    Status(StreamStatusArgs),
    /// Ends a run and records it in the history
    Complete {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Lists scheduled streams due around a point in time
    Due(StreamDueArgs),
    /// Deletes a stream
    Delete {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Lists finished runs
    History {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args, Debug)]
pub struct StreamCreateArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub rtmp_url: String,
    #[arg(long)]
    pub stream_key: String,
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub video: Option<String>,
    #[arg(long)]
    pub platform: Option<String>,
    /// RFC 3339 start time
    #[arg(long)]
    pub schedule: Option<DateTime<Utc>>,
    /// Run cap in minutes
    #[arg(long)]
    pub duration: Option<i64>,
    #[arg(long)]
    pub bitrate: Option<i64>,
    #[arg(long)]
    pub fps: Option<i64>,
    #[arg(long)]
    pub resolution: Option<String>,
    #[arg(long, default_value_t = false)]
    pub no_loop: bool,
    #[arg(long, default_value_t = false)]
    pub advanced: bool,
}

#[derive(Args, Debug)]
pub struct StreamListArgs {
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
}

#[derive(Args, Debug)]
pub struct StreamStatusArgs {
    pub id: String,
    #[arg(value_enum)]
    pub status: StatusArg,
    #[arg(long)]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct StreamDueArgs {
    /// Centre of the window; defaults to now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
    /// Half-width of the window; defaults to `scheduler.window_seconds`
    #[arg(long)]
    pub window_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Offline,
    Scheduled,
    Live,
}

impl From<StatusArg> for StreamStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Offline => StreamStatus::Offline,
            StatusArg::Scheduled => StreamStatus::Scheduled,
            StatusArg::Live => StreamStatus::Live,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Deletes expired sessions
    Sweep {
        /// Keep sweeping every `sessions.sweep_interval_seconds` until interrupted
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
    /// Counts live sessions
    Count,
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(*shell, &mut command, name, &mut io::stdout());
        return Ok(());
    }

    let config = load_streamflow_config(&cli.config)?;
    init_tracing(&config.logging.level);
    let context = AppContext::new(&cli, config)?;

    match &cli.command {
        Commands::Completions { .. } => {}
        Commands::Init => render(&context.init()?, cli.format)?,
        Commands::Probe(args) => render(&context.probe(args).await?, cli.format)?,
        Commands::Thumbnail(args) => render(&context.thumbnail(args).await?, cli.format)?,
        Commands::Video(VideoCommands::Add(args)) => {
            render(&context.video_add(args).await?, cli.format)?
        }
        Commands::Video(VideoCommands::List { user }) => {
            render(&context.video_list(user.as_deref())?, cli.format)?
        }
        Commands::Video(VideoCommands::Remove { id }) => {
            render(&context.video_remove(id).await?, cli.format)?
        }
        Commands::Stream(StreamCommands::Create(args)) => {
            render(&context.stream_create(args)?, cli.format)?
        }
        Commands::Stream(StreamCommands::List(args)) => {
            render(&context.stream_list(args)?, cli.format)?
        }
        Commands::Stream(StreamCommands::Status(args)) => {
            render(&context.stream_status(args)?, cli.format)?
        }
        Commands::Stream(StreamCommands::Complete { id, user }) => {
            render(&context.stream_complete(id, user)?, cli.format)?
        }
        Commands::Stream(StreamCommands::Due(args)) => {
            render(&context.stream_due(args)?, cli.format)?
        }
        Commands::Stream(StreamCommands::Delete { id, user }) => {
            render(&context.stream_delete(id, user)?, cli.format)?
        }
        Commands::Stream(StreamCommands::History { user, limit }) => {
            render(&context.stream_history(user, *limit)?, cli.format)?
        }
        Commands::Sessions(SessionCommands::Sweep { watch: false }) => {
            render(&context.sessions_sweep()?, cli.format)?
        }
        Commands::Sessions(SessionCommands::Sweep { watch: true }) => {
            render(&context.sessions_watch().await?, cli.format)?
        }
        Commands::Sessions(SessionCommands::Count) => {
            render(&context.sessions_count()?, cli.format)?
        }
    }
    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

struct AppContext {
    config: StreamflowConfig,
    store: SqliteStore,
    sessions_db: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl AppContext {
    fn new(cli: &Cli, config: StreamflowConfig) -> Result<Self> {
        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| config.database_path());
        let sessions_db = cli
            .sessions_database
            .clone()
            .unwrap_or_else(|| config.sessions_database_path());
        ensure_parent(&database)?;
        ensure_parent(&sessions_db)?;
        let store = SqliteStore::builder()
            .path(&database)
            .create_if_missing(true)
            .build()?;
        debug!(database = %database.display(), sessions = %sessions_db.display(), "using stores");
        Ok(Self {
            config,
            store,
            sessions_db,
            executor: Arc::new(SystemCommandExecutor),
        })
    }

    #[cfg(test)]
    fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    fn media_probe(&self) -> MediaProbe {
        MediaProbe::new(self.config.media_tools().ffprobe)
            .with_executor(self.executor.clone())
            .with_timeout(self.config.media.probe_timeout())
    }

    fn thumbnail_generator(&self) -> ThumbnailGenerator {
        ThumbnailGenerator::new(self.config.media_tools().ffmpeg, self.media_probe())
            .with_executor(self.executor.clone())
            .with_timeout(self.config.media.thumbnail_timeout())
    }

    fn ingestor(&self) -> Result<VideoIngestor> {
        Ok(VideoIngestor::new(
            self.store.clone(),
            self.media_probe(),
            self.thumbnail_generator(),
            &self.config.paths.media_root,
            self.config.thumbnails_dir(),
        )
        .with_thumbnail_options(self.config.thumbnail_options()?)
        .require_thumbnail(self.config.thumbnail.required))
    }

    fn session_store(&self) -> Result<SqliteSessionStore> {
        Ok(SqliteSessionStore::new(
            &self.sessions_db,
            Duration::from_secs(self.config.sessions.ttl_seconds),
        )?)
    }

    fn init(&self) -> Result<InitReport> {
        let applied = self.store.initialize()?;
        Ok(InitReport {
            database: self.store.path().to_path_buf(),
            applied,
            version: self.store.schema_version()?,
        })
    }

    async fn probe(&self, args: &ProbeArgs) -> Result<ProbeReport> {
        let mut result = self.media_probe().probe(&args.file).await?;
        if !args.raw {
            result.raw = serde_json::Value::Null;
        }
        Ok(ProbeReport {
            file: args.file.clone(),
            result,
        })
    }

    async fn thumbnail(&self, args: &ThumbnailArgs) -> Result<ThumbnailReport> {
        let mut options = ThumbnailOptions::default();
        if let Some(timestamp) = &args.timestamp {
            options.timestamp = timestamp
                .parse::<SeekTimestamp>()
                .map_err(AppError::InvalidArgument)?;
        }
        if let Some(size) = &args.size {
            options.size = size.clone();
        }
        if let Some(quality) = args.quality {
            options.quality = quality;
        }
        let path = self
            .thumbnail_generator()
            .generate(&args.video, &args.output, &options)
            .await?;
        Ok(ThumbnailReport { path })
    }

    async fn video_add(&self, args: &VideoAddArgs) -> Result<IngestReport> {
        self.store.initialize()?;
        let outcome = self
            .ingestor()?
            .register(IngestRequest {
                title: args.title.clone(),
                filepath: args.file.clone(),
                user_id: args.user.clone(),
                thumbnail_name: args.thumbnail_name.clone(),
            })
            .await?;
        Ok(IngestReport {
            video: outcome.video,
            thumbnail_error: outcome.thumbnail_error,
        })
    }

    fn video_list(&self, user: Option<&str>) -> Result<VideoList> {
        Ok(VideoList {
            rows: self.store.list_videos(user)?,
        })
    }

    async fn video_remove(&self, id: &str) -> Result<VideoAsset> {
        self.ingestor()?
            .remove(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("video {id}")))
    }

    fn stream_create(&self, args: &StreamCreateArgs) -> Result<StreamSummary> {
        let mut stream = NewStream::new(&args.title, &args.rtmp_url, &args.stream_key, &args.user);
        stream.video_id = args.video.clone();
        stream.platform = args.platform.clone();
        stream.schedule_time = args.schedule;
        stream.duration = args.duration;
        stream.resolution = args.resolution.clone();
        stream.loop_video = !args.no_loop;
        stream.use_advanced_settings = args.advanced;
        if let Some(bitrate) = args.bitrate {
            stream.bitrate = bitrate;
        }
        if let Some(fps) = args.fps {
            stream.fps = fps;
        }
        let created = self.store.create_stream(&stream)?;
        let joined = self
            .store
            .find_stream_with_video(&created.id)?
            .ok_or_else(|| AppError::NotFound(format!("stream {}", created.id)))?;
        Ok(StreamSummary::from(&joined))
    }

    fn stream_list(&self, args: &StreamListArgs) -> Result<StreamList> {
        let filter = StreamFilter {
            user_id: args.user.clone(),
            status: args.status.map(StreamStatus::from),
        };
        Ok(StreamList::from(self.store.list_streams(&filter)?))
    }

    fn stream_status(&self, args: &StreamStatusArgs) -> Result<StatusTransition> {
        Ok(LifecycleEngine::new(self.store.clone()).set_status(
            &args.id,
            args.status.into(),
            &args.user,
        )?)
    }

    fn stream_complete(&self, id: &str, user: &str) -> Result<CompletedRunReport> {
        let CompletedRun {
            transition,
            history,
        } = LifecycleEngine::new(self.store.clone()).complete_run(id, user)?;
        Ok(CompletedRunReport {
            transition,
            history,
        })
    }

    fn stream_due(&self, args: &StreamDueArgs) -> Result<StreamList> {
        let at = args.at.unwrap_or_else(Utc::now);
        let seconds = args
            .window_seconds
            .unwrap_or(self.config.scheduler.window_seconds);
        let half_width = chrono::Duration::try_seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
            .ok_or_else(|| AppError::InvalidArgument(format!("window of {seconds}s")))?;
        let due = ScheduleResolver::new(self.store.clone()).due_around(at, half_width)?;
        Ok(StreamList::from(due))
    }

    fn stream_delete(&self, id: &str, user: &str) -> Result<DeleteReport> {
        Ok(DeleteReport {
            id: id.to_string(),
            deleted: self.store.delete_stream(id, user)?,
        })
    }

    fn stream_history(&self, user: &str, limit: usize) -> Result<HistoryList> {
        Ok(HistoryList {
            rows: self.store.list_history(user, limit)?,
        })
    }

    fn sessions_sweep(&self) -> Result<SessionReport> {
        let removed = self.session_store()?.sweep_expired()?;
        Ok(SessionReport {
            action: "sweep",
            count: removed,
        })
    }

    async fn sessions_watch(&self) -> Result<SessionReport> {
        let every = self.config.sessions.sweep_interval();
        let store = Arc::new(self.session_store()?);
        let sweeper = spawn_session_sweeper(store.clone(), every);
        info!(every_seconds = every.as_secs(), "sweeping sessions until interrupted");
        tokio::signal::ctrl_c().await?;
        sweeper.abort();
        Ok(SessionReport {
            action: "watch",
            count: store.count()?,
        })
    }

    fn sessions_count(&self) -> Result<SessionReport> {
        let count = self.session_store()?.count()?;
        Ok(SessionReport {
            action: "count",
            count,
        })
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Serialize)]
struct InitReport {
    database: PathBuf,
    applied: Vec<u32>,
    version: u32,
}

impl DisplayFallback for InitReport {
    fn display(&self) -> String {
        if self.applied.is_empty() {
            format!(
                "{}: schema up to date (version {})",
                self.database.display(),
                self.version
            )
        } else {
            let applied: Vec<String> = self.applied.iter().map(u32::to_string).collect();
            format!(
                "{}: applied migrations {} (version {})",
                self.database.display(),
                applied.join(", "),
                self.version
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    file: PathBuf,
    #[serde(flatten)]
    result: ProbeResult,
}

impl DisplayFallback for ProbeReport {
    fn display(&self) -> String {
        let result = &self.result;
        let mut lines = vec![format!("{}", self.file.display())];
        lines.push(format!("  duration:   {:.3}s", result.duration));
        lines.push(format!("  format:     {}", result.format));
        lines.push(format!(
            "  resolution: {}",
            if result.resolution.is_empty() {
                "-"
            } else {
                result.resolution.as_str()
            }
        ));
        lines.push(format!(
            "  bitrate:    {}",
            result
                .bitrate
                .map(|kbps| format!("{kbps} kbps"))
                .unwrap_or_else(|| "-".into())
        ));
        lines.push(format!(
            "  fps:        {}",
            result
                .fps
                .map(|fps| fps.to_string())
                .unwrap_or_else(|| "-".into())
        ));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
struct ThumbnailReport {
    path: PathBuf,
}

impl DisplayFallback for ThumbnailReport {
    fn display(&self) -> String {
        format!("thumbnail written to {}", self.path.display())
    }
}

#[derive(Debug, Serialize)]
struct IngestReport {
    video: VideoAsset,
    thumbnail_error: Option<String>,
}

impl DisplayFallback for IngestReport {
    fn display(&self) -> String {
        let mut text = self.video.display();
        if let Some(error) = &self.thumbnail_error {
            text.push_str(&format!("\n  warning: no thumbnail ({error})"));
        }
        text
    }
}

impl DisplayFallback for VideoAsset {
    fn display(&self) -> String {
        format!(
            "{id} {title} [{resolution}, {duration:.1}s] {path}",
            id = self.id,
            title = self.title,
            resolution = or_dash(self.resolution.as_deref()),
            duration = self.duration,
            path = self.filepath
        )
    }
}

#[derive(Debug, Serialize)]
struct VideoList {
    rows: Vec<VideoAsset>,
}

impl DisplayFallback for VideoList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "no videos".to_string();
        }
        self.rows
            .iter()
            .map(DisplayFallback::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
struct StreamSummary {
    id: String,
    title: String,
    status: StreamStatus,
    user_id: String,
    platform: Option<String>,
    schedule_time: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    video_title: Option<String>,
    loop_video: bool,
}

impl From<&StreamWithVideo> for StreamSummary {
    fn from(value: &StreamWithVideo) -> Self {
        let stream = &value.stream;
        Self {
            id: stream.id.clone(),
            title: stream.title.clone(),
            status: stream.status,
            user_id: stream.user_id.clone(),
            platform: stream.platform.clone(),
            schedule_time: stream.schedule_time,
            start_time: stream.start_time,
            end_time: stream.end_time,
            video_title: value.video.as_ref().map(|video| video.title.clone()),
            loop_video: stream.loop_video,
        }
    }
}

impl DisplayFallback for StreamSummary {
    fn display(&self) -> String {
        format!(
            "{id} [{status}] {title} video={video} schedule={schedule} start={start} end={end}",
            id = self.id,
            status = self.status,
            title = self.title,
            video = or_dash(self.video_title.as_deref()),
            schedule = format_time(self.schedule_time),
            start = format_time(self.start_time),
            end = format_time(self.end_time),
        )
    }
}

#[derive(Debug, Serialize)]
struct StreamList {
    rows: Vec<StreamSummary>,
}

impl From<Vec<StreamWithVideo>> for StreamList {
    fn from(value: Vec<StreamWithVideo>) -> Self {
        Self {
            rows: value.iter().map(StreamSummary::from).collect(),
        }
    }
}

impl DisplayFallback for StreamList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "no streams".to_string();
        }
        self.rows
            .iter()
            .map(DisplayFallback::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for StatusTransition {
    fn display(&self) -> String {
        if self.updated {
            format!(
                "{} -> {} at {}",
                self.id,
                self.status,
                format_time(Some(self.status_updated_at))
            )
        } else {
            format!("{}: no matching stream for this user", self.id)
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletedRunReport {
    transition: StatusTransition,
    history: Option<StreamHistoryEntry>,
}

impl DisplayFallback for CompletedRunReport {
    fn display(&self) -> String {
        let mut text = self.transition.display();
        if let Some(entry) = &self.history {
            text.push_str(&format!(
                "\n  recorded run {} ({}s)",
                entry.id,
                entry.duration.unwrap_or_default()
            ));
        }
        text
    }
}

#[derive(Debug, Serialize)]
struct DeleteReport {
    id: String,
    deleted: bool,
}

impl DisplayFallback for DeleteReport {
    fn display(&self) -> String {
        if self.deleted {
            format!("{} deleted", self.id)
        } else {
            format!("{}: nothing deleted", self.id)
        }
    }
}

#[derive(Debug, Serialize)]
struct HistoryList {
    rows: Vec<StreamHistoryEntry>,
}

impl DisplayFallback for HistoryList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "no finished runs".to_string();
        }
        self.rows
            .iter()
            .map(|entry| {
                format!(
                    "{title} on {platform}: {start} -> {end} ({duration}s)",
                    title = entry.title,
                    platform = or_dash(entry.platform.as_deref()),
                    start = format_time(entry.start_time),
                    end = format_time(entry.end_time),
                    duration = entry.duration.unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
struct SessionReport {
    action: &'static str,
    count: u64,
}

impl DisplayFallback for SessionReport {
    fn display(&self) -> String {
        match self.action {
            "sweep" => format!("removed {} expired sessions", self.count),
            "watch" => format!("sweeper stopped, {} live sessions", self.count),
            _ => format!("{} live sessions", self.count),
        }
    }
}
