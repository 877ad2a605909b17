//! Cooperative cancellation via `Scheduler::stop`.

use std::sync::Arc;
use std::time::Duration;

use curricle::{Error, StartRequest, StepStatus, WorkflowId, WorkflowStatus, WorkflowStore};

use crate::fixtures::{
    test_config, test_scheduler, wait_for_step_running, wait_for_terminal, ScriptedInvoker,
};

#[tokio::test]
async fn test_stop_while_step_running() {
    let invoker = Arc::new(
        ScriptedInvoker::new().with_delay("worker_b", Duration::from_millis(300)),
    );
    let (scheduler, _store, _rx) = test_scheduler(Arc::clone(&invoker), test_config());

    let snapshot = scheduler
        .start(StartRequest::new("triangle"))
        .await
        .unwrap();
    let id = snapshot.workflow_id;

    wait_for_step_running(&scheduler, id, "b").await;
    let stopped = scheduler.stop(id).await.unwrap();

    assert_eq!(stopped.status, WorkflowStatus::Cancelled);
    let b = stopped.step("b").unwrap();
    assert!(matches!(b.status, StepStatus::Failed { ref error } if error == "cancelled"));
    assert!(stopped.steps.iter().all(|s| s.status != StepStatus::Running));

    // c never ran and never will
    assert_eq!(stopped.step("c").unwrap().status, StepStatus::Pending);
    assert_eq!(invoker.call_count("worker_c"), 0);
    assert!(scheduler.active_ids().await.is_empty());
}

#[tokio::test]
async fn test_stop_discards_late_worker_result() {
    let invoker = Arc::new(
        ScriptedInvoker::new().with_delay("worker_a", Duration::from_millis(100)),
    );
    let (scheduler, _store, _rx) = test_scheduler(Arc::clone(&invoker), test_config());

    let snapshot = scheduler
        .start(StartRequest::new("triangle"))
        .await
        .unwrap();
    let id = snapshot.workflow_id;

    wait_for_step_running(&scheduler, id, "a").await;
    scheduler.stop(id).await.unwrap();

    // Let the detached invocation finish in the background
    tokio::time::sleep(Duration::from_millis(200)).await;

    let after = scheduler.status(id).await.unwrap();
    assert_eq!(after.status, WorkflowStatus::Cancelled);
    let a = after.step("a").unwrap();
    assert!(matches!(a.status, StepStatus::Failed { ref error } if error == "cancelled"));
    assert!(after.completed_step_ids.is_empty());
    assert_eq!(invoker.call_count("worker_b"), 0);
}

#[tokio::test]
async fn test_stop_terminal_workflow_not_active() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let (scheduler, _store, _rx) = test_scheduler(Arc::clone(&invoker), test_config());

    let snapshot = scheduler
        .start(StartRequest::new("triangle"))
        .await
        .unwrap();
    let id = snapshot.workflow_id;
    wait_for_terminal(&scheduler, id).await;

    let err = scheduler.stop(id).await.unwrap_err();
    assert!(matches!(err, Error::WorkflowNotActive(stopped) if stopped == id));
}

#[tokio::test]
async fn test_stop_unknown_id_not_active() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let (scheduler, _store, _rx) = test_scheduler(invoker, test_config());

    let unknown = WorkflowId::new();
    let err = scheduler.stop(unknown).await.unwrap_err();
    assert!(matches!(err, Error::WorkflowNotActive(id) if id == unknown));
}

#[tokio::test]
async fn test_stop_persists_final_snapshot() {
    let invoker = Arc::new(
        ScriptedInvoker::new().with_delay("worker_a", Duration::from_millis(300)),
    );
    let (scheduler, store, _rx) = test_scheduler(Arc::clone(&invoker), test_config());

    let snapshot = scheduler
        .start(StartRequest::new("triangle"))
        .await
        .unwrap();
    let id = snapshot.workflow_id;

    wait_for_step_running(&scheduler, id, "a").await;
    scheduler.stop(id).await.unwrap();

    let persisted = store.load(id).await.unwrap().unwrap();
    assert_eq!(persisted.status, WorkflowStatus::Cancelled);
    assert!(persisted.error.as_deref() == Some("cancelled"));
}

#[tokio::test]
async fn test_stop_only_affects_target_workflow() {
    let invoker = Arc::new(
        ScriptedInvoker::new().with_delay("worker_a", Duration::from_millis(100)),
    );
    let (scheduler, _store, _rx) = test_scheduler(Arc::clone(&invoker), test_config());

    let victim = scheduler
        .start(StartRequest::new("triangle"))
        .await
        .unwrap();
    let survivor = scheduler.start(StartRequest::new("fanout")).await.unwrap();

    scheduler.stop(victim.workflow_id).await.unwrap();

    let survivor_done = wait_for_terminal(&scheduler, survivor.workflow_id).await;
    assert_eq!(survivor_done.status, WorkflowStatus::Completed);

    let victim_state = scheduler.status(victim.workflow_id).await.unwrap();
    assert_eq!(victim_state.status, WorkflowStatus::Cancelled);
}
