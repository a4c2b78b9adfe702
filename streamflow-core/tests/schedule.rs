use chrono::{DateTime, Duration, TimeZone, Utc};
use streamflow_core::{
    LifecycleEngine, NewStream, NewVideo, ScheduleResolver, SqliteStore, StreamStatus,
};
use tempfile::TempDir;

fn setup_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("streamflow.sqlite")).unwrap();
    store.initialize().unwrap();
    (dir, store)
}

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

fn schedule(store: &SqliteStore, key: &str, at: DateTime<Utc>) -> String {
    let mut stream = NewStream::new("Show", "rtmp://live.twitch.tv/app", key, "u1");
    stream.schedule_time = Some(at);
    store.create_stream_at(&stream, created_at()).unwrap().id
}

#[test]
fn window_bounds_are_inclusive_to_the_second() {
    let (_dir, store) = setup_store();
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let end = start + Duration::minutes(1);

    let at_start = schedule(&store, "a", start);
    let at_end = schedule(&store, "b", end);
    let inside = schedule(&store, "c", start + Duration::seconds(30));
    schedule(&store, "d", start - Duration::seconds(1));
    schedule(&store, "e", end + Duration::seconds(1));

    let resolver = ScheduleResolver::new(store.clone());
    let mut due: Vec<String> = resolver
        .find_due_in_range(start, end)
        .unwrap()
        .into_iter()
        .map(|run| run.stream.id)
        .collect();
    due.sort();
    let mut expected = vec![at_start, at_end, inside];
    expected.sort();
    assert_eq!(due, expected);
}

#[test]
fn sub_millisecond_bounds_do_not_widen_the_window() {
    let (_dir, store) = setup_store();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let id = schedule(&store, "edge", at);
    let half_ms = Duration::microseconds(500);
    let resolver = ScheduleResolver::new(store.clone());

    let ids = |start, end| -> Vec<String> {
        resolver
            .find_due_in_range(start, end)
            .unwrap()
            .into_iter()
            .map(|run| run.stream.id)
            .collect()
    };
    assert_eq!(ids(at - half_ms, at + half_ms), vec![id.clone()]);
    assert!(ids(at + half_ms, at + Duration::seconds(1)).is_empty());
    assert!(ids(at - Duration::seconds(1), at - half_ms).is_empty());
}

#[test]
fn only_scheduled_streams_are_due() {
    let (_dir, store) = setup_store();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let live = schedule(&store, "live", at);
    let waiting = schedule(&store, "waiting", at);
    LifecycleEngine::new(store.clone())
        .set_status_at(&live, StreamStatus::Live, "u1", at)
        .unwrap();

    let due = ScheduleResolver::new(store)
        .due_around(at, Duration::seconds(60))
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].stream.id, waiting);
    assert_eq!(due[0].stream.status, StreamStatus::Scheduled);
}

#[test]
fn due_streams_carry_video_fields() {
    let (_dir, store) = setup_store();
    let video = store
        .create_video(&NewVideo {
            title: "Reel".into(),
            filepath: "uploads/videos/reel.mp4".into(),
            thumbnail_path: Some("uploads/thumbnails/reel.jpg".into()),
            duration: 42.0,
            resolution: Some("1920x1080".into()),
            bitrate: Some(4500),
            fps: Some(29.97),
            user_id: "u1".into(),
            ..NewVideo::default()
        })
        .unwrap();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut stream = NewStream::new("Show", "rtmp://live.twitch.tv/app", "k", "u1");
    stream.schedule_time = Some(at);
    stream.video_id = Some(video.id);
    stream.loop_video = false;
    store.create_stream_at(&stream, created_at()).unwrap();

    let due = ScheduleResolver::new(store)
        .find_due_in_range(at, at)
        .unwrap();
    assert_eq!(due.len(), 1);
    assert!(!due[0].stream.loop_video);
    let summary = due[0].video.as_ref().unwrap();
    assert_eq!(summary.title, "Reel");
    assert_eq!(summary.filepath, "uploads/videos/reel.mp4");
    assert_eq!(summary.duration, Some(42.0));
    assert_eq!(summary.fps, Some(29.97));
}

#[test]
fn inverted_window_is_rejected() {
    let (_dir, store) = setup_store();
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert!(ScheduleResolver::new(store)
        .find_due_in_range(at, at - Duration::seconds(1))
        .is_err());
}
