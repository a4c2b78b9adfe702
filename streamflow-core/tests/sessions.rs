use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use streamflow_core::{spawn_session_sweeper, SessionStore, SqliteSessionStore};

fn store(dir: &tempfile::TempDir) -> SqliteSessionStore {
    SqliteSessionStore::new(dir.path().join("sessions.sqlite"), Duration::from_secs(60)).unwrap()
}

#[test]
fn set_get_and_expire() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = store(&dir);
    let now = 1_700_000_000_000;
    let doc = json!({"cookie": {"maxAge": 1_000}, "user": "u1"});

    sessions.set_at("a", &doc, now).unwrap();
    sessions.set_at("b", &json!({"user": "u2"}), now).unwrap();
    assert_eq!(sessions.get_at("a", now + 999).unwrap(), Some(doc));
    assert_eq!(sessions.get_at("a", now + 1_000).unwrap(), None);
    assert_eq!(sessions.count_at(now + 1_000).unwrap(), 1);

    assert_eq!(sessions.sweep_expired_at(now + 1_000).unwrap(), 1);
    assert_eq!(sessions.sweep_expired_at(now + 1_000).unwrap(), 0);
    assert!(sessions.get_at("b", now + 59_000).unwrap().is_some());
}

#[test]
fn destroy_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = store(&dir);
    sessions.set("a", &json!({"n": 1})).unwrap();
    sessions.set("b", &json!({"n": 2})).unwrap();
    assert_eq!(sessions.count().unwrap(), 2);

    sessions.set("a", &json!({"n": 3})).unwrap();
    assert_eq!(sessions.get("a").unwrap(), Some(json!({"n": 3})));

    sessions.destroy("a").unwrap();
    assert_eq!(sessions.get("a").unwrap(), None);
    sessions.clear().unwrap();
    assert_eq!(sessions.count().unwrap(), 0);
}

#[tokio::test]
async fn sweeper_removes_expired_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = store(&dir);
    sessions
        .set_at("old", &json!({}), 1_000)
        .unwrap();
    let shared: Arc<dyn SessionStore> = Arc::new(sessions.clone());

    let handle = spawn_session_sweeper(shared, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    assert_eq!(sessions.sweep_expired_at(i64::MAX).unwrap(), 0);
}
