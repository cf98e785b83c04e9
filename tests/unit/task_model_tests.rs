//! Unit tests for the task queue and assignment descriptors.

use taskgrid::models::task::{ActiveAssignment, QueuedTask};

#[test]
fn queued_task_keeps_payload_and_session() {
    let task = QueuedTask::new(
        "t-42".into(),
        serde_json::json!({"cmd": "lint", "paths": ["src/"]}),
        Some("sess-1".into()),
    );

    assert_eq!(task.task_id, "t-42");
    assert_eq!(task.payload["cmd"], "lint");
    assert_eq!(task.session_id.as_deref(), Some("sess-1"));
}

#[test]
fn queued_task_without_session() {
    let task = QueuedTask::new("t-1".into(), serde_json::Value::Null, None);
    assert!(task.session_id.is_none());
}

#[test]
fn assignment_retains_requeue_material() {
    let assignment = ActiveAssignment {
        worker_id: "w-1".into(),
        payload: serde_json::json!({"cmd": "build"}),
        session_id: Some("sess-9".into()),
    };

    // The payload and session survive in the assignment record so a
    // requeue after worker loss reconstructs the original descriptor.
    let requeued = QueuedTask::new(
        "t-7".into(),
        assignment.payload.clone(),
        assignment.session_id.clone(),
    );
    assert_eq!(requeued.payload, assignment.payload);
    assert_eq!(requeued.session_id, assignment.session_id);
}
