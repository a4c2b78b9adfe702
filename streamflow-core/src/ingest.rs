//! Registers uploaded files as video assets and removes them again.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::media::{
    MediaProbe, ProbeError, SeekTimestamp, ThumbnailError, ThumbnailGenerator, ThumbnailOptions,
    DEFAULT_SEEK_SECONDS,
};
use crate::store::{NewVideo, SqliteStore, StoreError, VideoAsset};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("thumbnail failed: {0}")]
    Thumbnail(#[from] ThumbnailError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub title: String,
    pub filepath: PathBuf,
    pub user_id: String,
    /// File name inside the thumbnails directory; derived from the video name when absent.
    pub thumbnail_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub video: VideoAsset,
    /// Set when the thumbnail failed but registration went ahead without it.
    pub thumbnail_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoIngestor {
    store: SqliteStore,
    probe: MediaProbe,
    thumbnails: ThumbnailGenerator,
    thumbnails_dir: PathBuf,
    media_root: PathBuf,
    options: ThumbnailOptions,
    require_thumbnail: bool,
}

impl VideoIngestor {
    pub fn new(
        store: SqliteStore,
        probe: MediaProbe,
        thumbnails: ThumbnailGenerator,
        media_root: impl Into<PathBuf>,
        thumbnails_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            probe,
            thumbnails,
            thumbnails_dir: thumbnails_dir.into(),
            media_root: media_root.into(),
            options: ThumbnailOptions {
                timestamp: SeekTimestamp::seconds(DEFAULT_SEEK_SECONDS),
                ..ThumbnailOptions::default()
            },
            require_thumbnail: false,
        }
    }

    pub fn with_thumbnail_options(mut self, options: ThumbnailOptions) -> Self {
        self.options = options;
        self
    }

    pub fn require_thumbnail(mut self, value: bool) -> Self {
        self.require_thumbnail = value;
        self
    }

    /// Probes the file, extracts a preview and stores the asset.
    ///
    /// A probe failure aborts before anything is written.
    pub async fn register(&self, request: IngestRequest) -> IngestResult<IngestOutcome> {
        let video_path = self.resolve(&request.filepath);
        let probed = self.probe.probe(&video_path).await?;
        let file_size = fs::metadata(&video_path)
            .await
            .map_err(|source| IngestError::Io {
                path: video_path.clone(),
                source,
            })?
            .len();

        let mut record = NewVideo {
            title: request.title,
            filepath: self.stored_path(&video_path),
            thumbnail_path: None,
            file_size: i64::try_from(file_size).ok(),
            duration: probed.duration,
            format: Some(probed.format).filter(|value| !value.is_empty()),
            resolution: Some(probed.resolution).filter(|value| !value.is_empty()),
            bitrate: probed.bitrate,
            fps: probed.fps,
            user_id: request.user_id,
        };
        record.validate()?;

        let thumbnail_name = request
            .thumbnail_name
            .unwrap_or_else(|| default_thumbnail_name(&video_path));
        let thumbnail_target = self.thumbnails_dir.join(&thumbnail_name);

        let (thumbnail_file, thumbnail_error) = match self
            .thumbnails
            .generate(&video_path, &thumbnail_target, &self.options)
            .await
        {
            Ok(path) => (Some(path), None),
            Err(err) if !self.require_thumbnail => {
                warn!(
                    file = %video_path.display(),
                    error = %err,
                    "thumbnail generation failed, registering without preview"
                );
                (None, Some(err.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        record.thumbnail_path = thumbnail_file.as_deref().map(|path| self.stored_path(path));

        let video = match self.store.create_video(&record) {
            Ok(video) => video,
            Err(err) => {
                if let Some(path) = &thumbnail_file {
                    discard_file(path).await;
                }
                return Err(err.into());
            }
        };
        info!(
            video_id = %video.id,
            duration = video.duration,
            resolution = video.resolution.as_deref().unwrap_or(""),
            "video ingested"
        );
        Ok(IngestOutcome {
            video,
            thumbnail_error,
        })
    }

    /// Deletes the record, then the media file and thumbnail on a best-effort basis.
    pub async fn remove(&self, id: &str) -> IngestResult<Option<VideoAsset>> {
        let Some(video) = self.store.delete_video(id)? else {
            return Ok(None);
        };
        let files = std::iter::once(video.filepath.as_str()).chain(video.thumbnail_path.as_deref());
        for stored in files {
            let path = self.resolve(Path::new(stored));
            if discard_file(&path).await {
                info!(video_id = %video.id, file = %path.display(), "removed media file");
            }
        }
        Ok(Some(video))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    /// Paths under the media root are stored relative to it.
    fn stored_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.media_root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Best-effort delete; failures are logged and reported as `false`.
async fn discard_file(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "could not remove media file");
            false
        }
    }
}

fn default_thumbnail_name(video: &Path) -> String {
    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    format!("{stem}-{}.jpg", &Uuid::new_v4().simple().to_string()[..8])
}
