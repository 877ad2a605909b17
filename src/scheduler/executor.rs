//! Per-workflow execution loop.
//!
//! Each active workflow is driven by exactly one instance of [`run`],
//! spawned by the scheduler. The loop selects runnable steps one at a
//! time, invokes workers under timeout, applies the retry policy, and
//! persists and broadcasts after every state change until the workflow
//! reaches a terminal status. No error escapes the loop; failure is
//! communicated through the instance's `error` field.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{StepStatus, WorkflowId, WorkflowInstance};
use crate::error::Error;

use super::Scheduler;

/// Drive one workflow instance to a terminal status.
///
/// Cancellation is cooperative: `Scheduler::stop` finalizes the instance
/// and cancels the token; the loop observes the token at its suspension
/// points and exits without touching the already-terminal state. An
/// in-flight worker invocation keeps running detached and its late result
/// is discarded.
pub(super) async fn run(
    scheduler: Scheduler,
    id: WorkflowId,
    instance: Arc<RwLock<WorkflowInstance>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            debug!(workflow_id = %id, "execution loop cancelled");
            break;
        }

        // Select the next runnable step: lowest index, all deps satisfied.
        let selected = {
            let guard = instance.read().await;
            if guard.status.is_terminal() {
                break;
            }
            guard.next_runnable()
        };

        let Some(index) = selected else {
            finalize(&scheduler, id, &instance).await;
            break;
        };

        // Mark the step running and capture what the invocation needs.
        let (step_id, worker_type, payload) = {
            let mut guard = instance.write().await;
            if guard.status.is_terminal() {
                break;
            }
            let step = &mut guard.steps[index];
            step.start();
            let step_id = step.id.clone();
            let worker_type = step.worker_type.clone();
            guard.current_step_id = Some(step_id.clone());
            guard.touch();
            let payload = guard.build_payload(&step_id);
            (step_id, worker_type, payload)
        };
        publish_snapshot(&scheduler, &instance).await;

        info!(
            workflow_id = %id,
            step_id = %step_id,
            worker_type = %worker_type,
            "step started"
        );

        // Run the invocation as its own task so cancellation can walk away
        // from it: dropping the JoinHandle detaches the task.
        let timeout = scheduler.config.timeout_for(&worker_type);
        let invoker = Arc::clone(&scheduler.invoker);
        let invocation_worker_type = worker_type.clone();
        let mut invocation = tokio::spawn(async move {
            match tokio::time::timeout(
                timeout,
                invoker.invoke(&invocation_worker_type, payload),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(timeout)),
            }
        });

        let join_result = tokio::select! {
            result = &mut invocation => result,
            _ = cancel.cancelled() => {
                debug!(
                    workflow_id = %id,
                    step_id = %step_id,
                    "cancelled mid-invocation, worker left to finish in background"
                );
                break;
            }
        };

        let outcome = match join_result {
            Ok(result) => result,
            Err(e) => Err(Error::StepExecution {
                step_id: step_id.clone(),
                message: format!("worker task panicked: {}", e),
            }),
        };

        // Apply the outcome, unless the workflow was stopped while the
        // worker ran — a late result for a no-longer-running step is
        // discarded.
        let backoff = {
            let mut guard = instance.write().await;
            if guard.status.is_terminal() {
                debug!(
                    workflow_id = %id,
                    step_id = %step_id,
                    "late worker result discarded"
                );
                break;
            }
            let step = &mut guard.steps[index];
            if step.status != StepStatus::Running {
                continue;
            }

            let backoff = match outcome {
                Ok(value) => {
                    step.complete(value);
                    info!(
                        workflow_id = %id,
                        step_id = %step_id,
                        duration_ms = step.actual_duration_ms,
                        "step completed"
                    );
                    None
                }
                Err(e) => {
                    let message = e.to_string();
                    step.fail(&message);
                    if step.can_retry() {
                        step.reset_for_retry();
                        let delay = scheduler.config.backoff_delay(step.retry_count);
                        warn!(
                            workflow_id = %id,
                            step_id = %step_id,
                            retry = step.retry_count,
                            max_retries = step.max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            error = %message,
                            "step failed, will retry"
                        );
                        Some(delay)
                    } else {
                        warn!(
                            workflow_id = %id,
                            step_id = %step_id,
                            error = %message,
                            "step failed, retries exhausted"
                        );
                        None
                    }
                }
            };
            guard.current_step_id = None;
            guard.touch();
            backoff
        };
        publish_snapshot(&scheduler, &instance).await;

        if let Some(delay) = backoff {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }

    // Normal exit removes the entry; after a stop this is a no-op because
    // stop already removed it.
    scheduler.remove_active(id).await;
}

/// Close out a workflow with no runnable step left.
async fn finalize(scheduler: &Scheduler, id: WorkflowId, instance: &Arc<RwLock<WorkflowInstance>>) {
    {
        let mut guard = instance.write().await;
        if guard.status.is_terminal() {
            return;
        }
        if guard.all_satisfied() {
            guard.finish_completed();
            let (finished, total) = guard.progress();
            info!(
                workflow_id = %id,
                steps = total,
                finished,
                "workflow completed"
            );
        } else {
            let (step_id, error) = guard
                .first_terminal_failure()
                .map(|s| {
                    (
                        s.id.clone(),
                        s.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                    )
                })
                .unwrap_or_else(|| ("unknown".to_string(), "no runnable steps".to_string()));
            guard.finish_failed(&step_id, &error);
            warn!(
                workflow_id = %id,
                step_id = %step_id,
                error = %error,
                "workflow failed"
            );
        }
    }
    publish_snapshot(scheduler, instance).await;
}

/// Persist and broadcast the current state of the instance.
async fn publish_snapshot(scheduler: &Scheduler, instance: &Arc<RwLock<WorkflowInstance>>) {
    let snapshot = instance.read().await.clone();
    scheduler.persist(&snapshot).await;
    scheduler.broadcast(&snapshot).await;
}
