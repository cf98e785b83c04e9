//! Integration tests for session lifecycle, progress accounting,
//! queries, and snapshot persistence.

use taskgrid::models::session::SessionStatus;
use taskgrid::orchestrator::session_manager::SessionManager;
use taskgrid::persistence::store::SessionStore;
use taskgrid::AppError;

use super::test_helpers::{manager, meta};

#[tokio::test]
async fn create_then_start_sets_running_and_worker() {
    let (_dir, mgr) = manager();

    let session = mgr.create_session("batch", 4, meta()).await.expect("create");
    assert_eq!(session.status, SessionStatus::Created);

    let started = mgr
        .start_session(&session.id, Some("w-1"))
        .await
        .expect("start");
    assert_eq!(started.status, SessionStatus::Running);
    assert_eq!(started.worker_id.as_deref(), Some("w-1"));
    assert!(started.started_at.is_some());
}

#[tokio::test]
async fn start_unknown_session_is_not_found() {
    let (_dir, mgr) = manager();
    let result = mgr.start_session("ghost", None).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn pause_requires_running() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("s", 1, meta()).await.expect("create");

    let result = mgr.pause_session(&session.id).await;
    assert!(
        matches!(result, Err(AppError::InvalidState(_))),
        "pausing a created session is rejected"
    );

    mgr.start_session(&session.id, None).await.expect("start");
    let paused = mgr.pause_session(&session.id).await.expect("pause");
    assert_eq!(paused.status, SessionStatus::Paused);
}

#[tokio::test]
async fn resume_overwrites_started_at_by_default() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("s", 1, meta()).await.expect("create");

    let first = mgr.start_session(&session.id, None).await.expect("start");
    let first_started = first.started_at.expect("started_at set");

    mgr.pause_session(&session.id).await.expect("pause");
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let resumed = mgr.start_session(&session.id, None).await.expect("resume");

    assert!(
        resumed.started_at.expect("started_at set") > first_started,
        "each start rewrites started_at"
    );
}

#[tokio::test]
async fn first_start_wins_preserves_original_timestamp() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path().join("state.json"));
    let mgr = SessionManager::new(store).first_start_wins(true);

    let session = mgr.create_session("s", 1, meta()).await.expect("create");
    let first = mgr.start_session(&session.id, None).await.expect("start");
    let first_started = first.started_at.expect("started_at set");

    mgr.pause_session(&session.id).await.expect("pause");
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let resumed = mgr.start_session(&session.id, None).await.expect("resume");

    assert_eq!(
        resumed.started_at.expect("started_at set"),
        first_started,
        "the original start time survives the resume"
    );
}

#[tokio::test]
async fn complete_forces_full_progress() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("s", 10, meta()).await.expect("create");
    mgr.start_session(&session.id, None).await.expect("start");
    mgr.update_progress(&session.id, 3, 0, 2).await.expect("progress");

    let completed = mgr.complete_session(&session.id).await.expect("complete");

    assert_eq!(completed.status, SessionStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert!((completed.progress_percent - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn fail_and_cancel_set_terminal_status() {
    let (_dir, mgr) = manager();

    let a = mgr.create_session("a", 1, meta()).await.expect("create");
    mgr.start_session(&a.id, None).await.expect("start");
    let failed = mgr.fail_session(&a.id).await.expect("fail");
    assert_eq!(failed.status, SessionStatus::Failed);
    assert!(failed.completed_at.is_some());

    let b = mgr.create_session("b", 1, meta()).await.expect("create");
    mgr.start_session(&b.id, None).await.expect("start");
    mgr.pause_session(&b.id).await.expect("pause");
    let cancelled = mgr.cancel_session(&b.id).await.expect("cancel from paused");
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn terminal_sessions_reject_further_transitions() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("s", 1, meta()).await.expect("create");
    mgr.start_session(&session.id, None).await.expect("start");
    mgr.complete_session(&session.id).await.expect("complete");

    assert!(matches!(
        mgr.start_session(&session.id, None).await,
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(
        mgr.fail_session(&session.id).await,
        Err(AppError::InvalidState(_))
    ));
}

#[tokio::test]
async fn complete_from_created_is_rejected() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("s", 1, meta()).await.expect("create");

    let result = mgr.complete_session(&session.id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn update_progress_is_idempotent() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("s", 8, meta()).await.expect("create");

    let first = mgr.update_progress(&session.id, 2, 1, 3).await.expect("update");
    let second = mgr.update_progress(&session.id, 2, 1, 3).await.expect("update");

    assert!((first.progress_percent - second.progress_percent).abs() < f64::EPSILON);
    assert!((second.progress_percent - 25.0).abs() < f64::EPSILON);
    assert_eq!(second.completed_tasks, 2);
    assert_eq!(second.failed_tasks, 1);
    assert_eq!(second.in_progress_tasks, 3);
}

#[tokio::test]
async fn progress_with_zero_total_stays_zero() {
    let (_dir, mgr) = manager();
    let session = mgr.create_session("empty", 0, meta()).await.expect("create");

    let updated = mgr.update_progress(&session.id, 7, 0, 0).await.expect("update");
    assert!((updated.progress_percent - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn list_sessions_newest_first_with_filter() {
    let (_dir, mgr) = manager();

    let a = mgr.create_session("first", 1, meta()).await.expect("create");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let b = mgr.create_session("second", 1, meta()).await.expect("create");
    mgr.start_session(&b.id, None).await.expect("start");

    let all = mgr.list_sessions(None).await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, b.id, "newest created comes first");
    assert_eq!(all[1].id, a.id);

    let running = mgr.list_sessions(Some(SessionStatus::Running)).await;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, b.id);
}

#[tokio::test]
async fn active_sessions_cover_running_and_paused() {
    let (_dir, mgr) = manager();

    let created = mgr.create_session("c", 1, meta()).await.expect("create");
    let running = mgr.create_session("r", 1, meta()).await.expect("create");
    mgr.start_session(&running.id, None).await.expect("start");
    let paused = mgr.create_session("p", 1, meta()).await.expect("create");
    mgr.start_session(&paused.id, None).await.expect("start");
    mgr.pause_session(&paused.id).await.expect("pause");

    let active = mgr.get_active_sessions().await;
    let ids: Vec<&str> = active.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(active.len(), 2);
    assert!(ids.contains(&running.id.as_str()));
    assert!(ids.contains(&paused.id.as_str()));
    assert!(!ids.contains(&created.id.as_str()));
}

#[tokio::test]
async fn sessions_by_status_string_rejects_unknown_name() {
    let (_dir, mgr) = manager();
    mgr.create_session("s", 1, meta()).await.expect("create");

    let found = mgr.get_sessions_by_status("created").await.expect("query");
    assert_eq!(found.len(), 1);

    let result = mgr.get_sessions_by_status("exploded").await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn stats_count_per_status() {
    let (_dir, mgr) = manager();

    let r = mgr.create_session("r", 1, meta()).await.expect("create");
    mgr.start_session(&r.id, None).await.expect("start");

    let p = mgr.create_session("p", 1, meta()).await.expect("create");
    mgr.start_session(&p.id, None).await.expect("start");
    mgr.pause_session(&p.id).await.expect("pause");

    let c = mgr.create_session("c", 1, meta()).await.expect("create");
    mgr.start_session(&c.id, None).await.expect("start");
    mgr.complete_session(&c.id).await.expect("complete");

    let f = mgr.create_session("f", 1, meta()).await.expect("create");
    mgr.start_session(&f.id, None).await.expect("start");
    mgr.fail_session(&f.id).await.expect("fail");

    let stats = mgr.get_stats().await;
    assert_eq!(stats.total, 4);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.paused, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn state_survives_reload_from_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path().join("state.json"));

    let session_id = {
        let mgr = SessionManager::new(store.clone());
        let session = mgr.create_session("durable", 3, meta()).await.expect("create");
        mgr.start_session(&session.id, Some("w-9")).await.expect("start");
        mgr.update_progress(&session.id, 1, 0, 1).await.expect("progress");
        session.id
    };

    let reloaded = SessionManager::load(store).await.expect("reload");
    let session = reloaded
        .get_session(&session_id)
        .await
        .expect("session restored");
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.worker_id.as_deref(), Some("w-9"));
    assert_eq!(session.completed_tasks, 1);
}
