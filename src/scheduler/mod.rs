//! Scheduler: the public surface of the orchestration engine.
//!
//! The scheduler materializes workflow instances from templates, owns the
//! table of active instances, and spawns one execution loop per instance.
//! Callers interact through `start`, `status`, `stop`, and `resume`;
//! everything else happens inside the per-workflow loop in [`executor`].

mod executor;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcast::ProgressBroadcaster;
use crate::config::EngineConfig;
use crate::core::{Priority, StepStatus, WorkflowId, WorkflowInstance};
use crate::error::{Error, Result};
use crate::invoker::WorkerInvoker;
use crate::store::WorkflowStore;
use crate::template::TemplateRegistry;

/// A request to start a workflow.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// The workflow kind to instantiate.
    pub kind: String,
    /// Opaque parameters handed to every step.
    pub parameters: Map<String, Value>,
    /// Who is asking, if known.
    pub requester_id: Option<String>,
    /// Requested priority.
    pub priority: Priority,
}

impl StartRequest {
    /// Request for the given kind with empty parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            parameters: Map::new(),
            requester_id: None,
            priority: Priority::default(),
        }
    }

    /// Set the request parameters.
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the requester id.
    pub fn with_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// An entry in the active-instance table.
///
/// The instance lock is shared between the owning execution loop and the
/// `status`/`stop` entry points; the token cancels the loop cooperatively.
struct ActiveWorkflow {
    instance: Arc<RwLock<WorkflowInstance>>,
    cancel: CancellationToken,
}

/// The orchestration engine.
///
/// Cheap to clone; all state is behind `Arc`s. One `Scheduler` serves any
/// number of concurrent workflows, each driven by its own tokio task.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use curricle::{Scheduler, StartRequest};
///
/// let scheduler = Scheduler::new(registry, invoker, store, broadcaster, config);
/// let snapshot = scheduler.start(StartRequest::new("curriculum_analysis")).await?;
/// let current = scheduler.status(snapshot.workflow_id).await?;
/// ```
#[derive(Clone)]
pub struct Scheduler {
    registry: Arc<TemplateRegistry>,
    invoker: Arc<dyn WorkerInvoker>,
    store: Arc<dyn WorkflowStore>,
    broadcaster: Arc<dyn ProgressBroadcaster>,
    config: Arc<EngineConfig>,
    active: Arc<RwLock<HashMap<WorkflowId, ActiveWorkflow>>>,
}

impl Scheduler {
    /// Create a scheduler over the given collaborators.
    pub fn new(
        registry: Arc<TemplateRegistry>,
        invoker: Arc<dyn WorkerInvoker>,
        store: Arc<dyn WorkflowStore>,
        broadcaster: Arc<dyn ProgressBroadcaster>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            invoker,
            store,
            broadcaster,
            config: Arc::new(config),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a workflow.
    ///
    /// Resolves the template, materializes an instance with every step
    /// Pending, persists and broadcasts the initial snapshot, registers the
    /// instance as active, and spawns its execution loop. Returns the
    /// initial snapshot without waiting for the workflow to finish.
    ///
    /// # Errors
    /// `Error::UnknownWorkflowKind` if the kind is not registered. This is
    /// a request error: no state is created and nothing is retried.
    pub async fn start(&self, request: StartRequest) -> Result<WorkflowInstance> {
        let template = self.registry.resolve(&request.kind)?;
        let instance = WorkflowInstance::from_template(
            template,
            request.parameters,
            request.requester_id,
            request.priority,
            self.config.default_max_retries,
        );
        let snapshot = instance.clone();
        info!(
            workflow_id = %snapshot.workflow_id,
            kind = %snapshot.kind,
            steps = snapshot.steps.len(),
            "workflow started"
        );

        self.persist(&snapshot).await;
        self.broadcast(&snapshot).await;
        self.register_and_spawn(instance).await;

        Ok(snapshot)
    }

    /// Current snapshot of a workflow.
    ///
    /// The active table is authoritative for running workflows; the store
    /// covers workflows that finished or ran in an earlier process. No
    /// side effects.
    pub async fn status(&self, id: WorkflowId) -> Result<WorkflowInstance> {
        if let Some(entry) = self.active.read().await.get(&id) {
            return Ok(entry.instance.read().await.clone());
        }
        self.store
            .load(id)
            .await?
            .ok_or(Error::WorkflowNotFound(id))
    }

    /// Stop an active workflow.
    ///
    /// Marks the running step (if any) failed with reason "cancelled",
    /// marks the workflow Cancelled, persists and broadcasts the final
    /// snapshot, and removes the instance from the active table. An
    /// in-flight worker invocation is not interrupted; it finishes in the
    /// background and its result is discarded.
    ///
    /// # Errors
    /// `Error::WorkflowNotActive` if the id is not in this process's
    /// active table — a workflow that already reached a terminal status,
    /// or one running elsewhere, cannot be stopped through this call.
    /// Use [`resume`](Self::resume) to re-attach a persisted workflow
    /// first if needed.
    pub async fn stop(&self, id: WorkflowId) -> Result<WorkflowInstance> {
        let entry = self
            .active
            .write()
            .await
            .remove(&id)
            .ok_or(Error::WorkflowNotActive(id))?;

        entry.cancel.cancel();

        let snapshot = {
            let mut instance = entry.instance.write().await;
            if !instance.status.is_terminal() {
                instance.finish_cancelled();
            }
            instance.clone()
        };

        info!(workflow_id = %id, "workflow stopped");
        self.persist(&snapshot).await;
        self.broadcast(&snapshot).await;

        Ok(snapshot)
    }

    /// Re-attach a persisted, non-terminal workflow after a restart.
    ///
    /// Previously Completed steps are marked Skipped — their stored
    /// results still feed dependent payloads and the final merge — and a
    /// step left Running by the dead process returns to Pending (its
    /// invocation is lost; the attempt does not count against the retry
    /// budget). The workflow then runs under the normal execution loop.
    ///
    /// Resuming an id that is already active in this process returns the
    /// live snapshot unchanged.
    ///
    /// # Errors
    /// `Error::WorkflowNotFound` for unknown ids,
    /// `Error::WorkflowNotResumable` for terminal workflows.
    pub async fn resume(&self, id: WorkflowId) -> Result<WorkflowInstance> {
        if let Some(entry) = self.active.read().await.get(&id) {
            return Ok(entry.instance.read().await.clone());
        }

        let mut instance = self
            .store
            .load(id)
            .await?
            .ok_or(Error::WorkflowNotFound(id))?;

        if instance.status.is_terminal() {
            return Err(Error::WorkflowNotResumable {
                id,
                status: instance.status.to_string(),
            });
        }

        for step in &mut instance.steps {
            match step.status {
                StepStatus::Completed => step.skip(),
                StepStatus::Running => {
                    step.status = StepStatus::Pending;
                    step.progress_percent = None;
                }
                _ => {}
            }
        }
        instance.current_step_id = None;
        instance.touch();

        let snapshot = instance.clone();
        info!(workflow_id = %id, kind = %snapshot.kind, "workflow resumed");
        self.persist(&snapshot).await;
        self.broadcast(&snapshot).await;
        self.register_and_spawn(instance).await;

        Ok(snapshot)
    }

    /// Ids of workflows currently active in this process.
    pub async fn active_ids(&self) -> Vec<WorkflowId> {
        self.active.read().await.keys().copied().collect()
    }

    async fn register_and_spawn(&self, instance: WorkflowInstance) {
        let id = instance.workflow_id;
        let shared = Arc::new(RwLock::new(instance));
        let cancel = CancellationToken::new();

        self.active.write().await.insert(
            id,
            ActiveWorkflow {
                instance: Arc::clone(&shared),
                cancel: cancel.clone(),
            },
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            executor::run(scheduler, id, shared, cancel).await;
        });
    }

    /// Persist a snapshot, downgrading failures to warnings.
    ///
    /// The in-memory instance is always the most current copy; a store
    /// outage must not fail the workflow.
    pub(crate) async fn persist(&self, snapshot: &WorkflowInstance) {
        if let Err(e) = self.store.save(snapshot).await {
            warn!(
                workflow_id = %snapshot.workflow_id,
                error = %e,
                "failed to persist workflow snapshot"
            );
        }
    }

    /// Broadcast a snapshot, downgrading failures to warnings.
    pub(crate) async fn broadcast(&self, snapshot: &WorkflowInstance) {
        if let Err(e) = self.broadcaster.publish(snapshot).await {
            warn!(
                workflow_id = %snapshot.workflow_id,
                error = %e,
                "failed to broadcast workflow snapshot"
            );
        }
    }

    async fn remove_active(&self, id: WorkflowId) {
        self.active.write().await.remove(&id);
    }
}
