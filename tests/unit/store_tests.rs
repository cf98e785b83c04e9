//! Unit tests for the snapshot store: round-trip, missing/corrupt file
//! handling, and the atomic-rewrite invariant.

use taskgrid::models::session::{Session, SessionStatus};
use taskgrid::persistence::store::SessionStore;
use taskgrid::AppError;

fn store_in(dir: &tempfile::TempDir) -> SessionStore {
    SessionStore::new(dir.path().join("state.json"))
}

fn sample_session(name: &str) -> Session {
    Session::new(name.to_owned(), 5, serde_json::Map::new())
}

#[tokio::test]
async fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    let sessions = store.load().await.expect("load");
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    let mut a = sample_session("alpha");
    a.status = SessionStatus::Running;
    a.files_locked.insert("src/lib.rs".into());
    let b = sample_session("beta");

    store.save(vec![a.clone(), b.clone()]).await.expect("save");
    let loaded = store.load().await.expect("load");

    assert_eq!(loaded, vec![a, b]);
}

#[tokio::test]
async fn snapshot_envelope_has_version_and_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    store.save(vec![sample_session("v")]).await.expect("save");

    let raw = std::fs::read_to_string(store.path()).expect("read file");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value["version"], "1.0");
    assert!(value["sessions"].is_array());
    assert_eq!(value["sessions"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn save_overwrites_previous_snapshot_in_full() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    store
        .save(vec![sample_session("one"), sample_session("two")])
        .await
        .expect("first save");
    store.save(vec![sample_session("three")]).await.expect("second save");

    let loaded = store.load().await.expect("load");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "three");
}

#[tokio::test]
async fn no_temp_file_remains_after_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    store.save(vec![sample_session("s")]).await.expect("save");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(std::result::Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp file must be renamed away: {leftovers:?}");
}

#[tokio::test]
async fn corrupt_file_is_a_persist_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    std::fs::write(store.path(), b"{ not json").expect("write garbage");

    let result = store.load().await;
    assert!(matches!(result, Err(AppError::Persist(_))));
}

#[tokio::test]
async fn version_drift_still_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(&dir);

    let session = sample_session("old");
    let raw = serde_json::json!({
        "version": "0.9",
        "sessions": [session],
    });
    std::fs::write(store.path(), serde_json::to_vec(&raw).expect("bytes")).expect("write");

    let loaded = store.load().await.expect("load tolerates version drift");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "old");
}

#[tokio::test]
async fn save_creates_missing_parent_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path().join("nested").join("deep").join("state.json"));

    store.save(vec![sample_session("n")]).await.expect("save");
    let loaded = store.load().await.expect("load");
    assert_eq!(loaded.len(), 1);
}
