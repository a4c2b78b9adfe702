mod common;

use std::path::Path;

use common::{Reply, ScriptedExecutor, PROBE_1080P};
use streamflow_core::{
    IngestError, IngestRequest, MediaProbe, ProbeError, SqliteStore, StoreError,
    ThumbnailGenerator, VideoIngestor,
};
use tempfile::TempDir;

struct Fixture {
    root: TempDir,
    store: SqliteStore,
    executor: std::sync::Arc<ScriptedExecutor>,
    ingestor: VideoIngestor,
}

fn fixture(probe: Reply, transcode: Reply) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(root.path().join("streamflow.sqlite")).unwrap();
    store.initialize().unwrap();
    let executor = ScriptedExecutor::new(probe, transcode);
    let probe = MediaProbe::new("ffprobe").with_executor(executor.clone());
    let thumbnails = ThumbnailGenerator::new("ffmpeg", probe.clone()).with_executor(executor.clone());
    let ingestor = VideoIngestor::new(
        store.clone(),
        probe,
        thumbnails,
        root.path(),
        root.path().join("uploads/thumbnails"),
    );
    std::fs::create_dir_all(root.path().join("uploads/videos")).unwrap();
    std::fs::write(root.path().join("uploads/videos/show.mp4"), vec![0u8; 2048]).unwrap();
    Fixture {
        root,
        store,
        executor,
        ingestor,
    }
}

fn request() -> IngestRequest {
    IngestRequest {
        title: "Show".into(),
        filepath: "uploads/videos/show.mp4".into(),
        user_id: "u1".into(),
        thumbnail_name: Some("show.jpg".into()),
    }
}

#[tokio::test]
async fn register_stores_probed_metadata_and_thumbnail() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::frame());
    let outcome = fx.ingestor.register(request()).await.unwrap();
    let video = outcome.video;

    assert!(outcome.thumbnail_error.is_none());
    assert_eq!(video.filepath, "uploads/videos/show.mp4");
    assert_eq!(video.thumbnail_path.as_deref(), Some("uploads/thumbnails/show.jpg"));
    assert_eq!(video.file_size, Some(2048));
    assert_eq!(video.duration, 120.0);
    assert_eq!(video.resolution.as_deref(), Some("1920x1080"));
    assert_eq!(video.bitrate, Some(4500));
    assert_eq!(video.fps, Some(29.97));
    assert!(fx.root.path().join("uploads/thumbnails/show.jpg").exists());

    let ffmpeg = &fx.executor.calls_to("ffmpeg")[0];
    let seek = ffmpeg.iter().position(|arg| arg == "-ss").unwrap();
    assert_eq!(ffmpeg[seek + 1], "10");
}

#[tokio::test]
async fn failed_probe_registers_nothing() {
    let fx = fixture(Reply::fail(1, "moov atom not found"), Reply::frame());
    let err = fx.ingestor.register(request()).await.unwrap_err();
    match err {
        IngestError::Probe(ProbeError::Exit { exit_code, stderr }) => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(stderr, "moov atom not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fx.store.list_videos(None).unwrap().is_empty());
    assert!(fx.executor.calls_to("ffmpeg").is_empty());
}

#[tokio::test]
async fn thumbnail_failure_is_reported_but_optional() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::fail(1, "Conversion failed!"));
    let outcome = fx.ingestor.register(request()).await.unwrap();
    assert!(outcome.video.thumbnail_path.is_none());
    assert!(outcome
        .thumbnail_error
        .as_deref()
        .unwrap()
        .contains("Conversion failed!"));
}

#[tokio::test]
async fn required_thumbnail_failure_aborts() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::ok(""));
    let ingestor = fx.ingestor.clone().require_thumbnail(true);
    assert!(matches!(
        ingestor.register(request()).await,
        Err(IngestError::Thumbnail(_))
    ));
    assert!(fx.store.list_videos(None).unwrap().is_empty());
}

#[tokio::test]
async fn invalid_record_is_rejected_before_extracting_a_frame() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::frame());
    let mut blank = request();
    blank.title = "   ".into();
    assert!(matches!(
        fx.ingestor.register(blank).await,
        Err(IngestError::Store(StoreError::Validation(_)))
    ));
    assert!(fx.executor.calls_to("ffmpeg").is_empty());
    assert!(!fx.root.path().join("uploads/thumbnails/show.jpg").exists());
    assert!(fx.store.list_videos(None).unwrap().is_empty());
}

#[tokio::test]
async fn failed_insert_discards_the_generated_thumbnail() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::frame());
    let unmigrated = SqliteStore::new(fx.root.path().join("unmigrated.sqlite")).unwrap();
    let probe = MediaProbe::new("ffprobe").with_executor(fx.executor.clone());
    let thumbnails =
        ThumbnailGenerator::new("ffmpeg", probe.clone()).with_executor(fx.executor.clone());
    let ingestor = VideoIngestor::new(
        unmigrated,
        probe,
        thumbnails,
        fx.root.path(),
        fx.root.path().join("uploads/thumbnails"),
    );

    assert!(matches!(
        ingestor.register(request()).await,
        Err(IngestError::Store(_))
    ));
    assert_eq!(fx.executor.calls_to("ffmpeg").len(), 1);
    assert!(!fx.root.path().join("uploads/thumbnails/show.jpg").exists());
}

#[tokio::test]
async fn remove_deletes_files_and_tolerates_missing_ones() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::frame());
    let video = fx.ingestor.register(request()).await.unwrap().video;
    let media = fx.root.path().join("uploads/videos/show.mp4");
    let thumbnail = fx.root.path().join("uploads/thumbnails/show.jpg");

    std::fs::remove_file(&thumbnail).unwrap();
    let removed = fx.ingestor.remove(&video.id).await.unwrap().unwrap();
    assert_eq!(removed.id, video.id);
    assert!(!media.exists());
    assert!(fx.store.find_video(&video.id).unwrap().is_none());

    assert!(fx.ingestor.remove(&video.id).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_source_file_is_an_io_error() {
    let fx = fixture(Reply::ok(PROBE_1080P), Reply::frame());
    let mut missing = request();
    missing.filepath = Path::new("uploads/videos/absent.mp4").to_path_buf();
    assert!(matches!(
        fx.ingestor.register(missing).await,
        Err(IngestError::Io { .. })
    ));
}
