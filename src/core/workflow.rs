//! Workflow instance aggregate.
//!
//! A `WorkflowInstance` is the single mutable aggregate the scheduler
//! drives: the materialized steps of a template plus workflow-level
//! status, bookkeeping, and the merged results. All mutation goes through
//! the owning execution loop (or `stop`, which synchronizes on the same
//! lock), so the helpers here are plain synchronous methods.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::template::WorkflowTemplate;

use super::step::{StepInstance, StepStatus};

/// Unique identifier for a workflow instance.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Create a new unique workflow identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Status of a workflow instance.
///
/// `Running` is the only non-terminal state; once any other status is
/// reached no step inside the instance changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// The execution loop is (or will be) driving this workflow.
    #[default]
    Running,
    /// Every step finished as Completed or Skipped.
    Completed,
    /// A step failed terminally and no runnable step remained.
    Failed,
    /// The workflow was stopped by request.
    Cancelled,
}

impl WorkflowStatus {
    /// Whether this status permits no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Requester-facing priority of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Request metadata carried on the instance for diagnosis and auditing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowMetadata {
    /// Who asked for the workflow, if known.
    pub requester_id: Option<String>,
    /// Requested priority.
    pub priority: Priority,
    /// The parameters the workflow was started with, verbatim.
    pub original_parameters: Map<String, Value>,
}

/// The aggregate root driven by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique identifier.
    pub workflow_id: WorkflowId,
    /// The workflow kind this instance was materialized from.
    pub kind: String,
    /// Workflow-level status.
    pub status: WorkflowStatus,
    /// Execution records, in template order.
    pub steps: Vec<StepInstance>,
    /// Ids of steps whose status is Completed. Kept in sync by
    /// [`touch`](Self::touch) after every mutation.
    pub completed_step_ids: BTreeSet<String>,
    /// Id of the step currently (or most recently) running.
    pub current_step_id: Option<String>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// When the instance was last mutated. Monotonically non-decreasing.
    pub updated_at: DateTime<Utc>,
    /// When the instance reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Projected completion time from remaining step estimates.
    pub estimated_completion_at: Option<DateTime<Utc>>,
    /// Terminal failure description, if any.
    pub error: Option<String>,
    /// Step results keyed by step id, populated at completion.
    pub results: Map<String, Value>,
    /// Request metadata.
    pub metadata: WorkflowMetadata,
}

impl WorkflowInstance {
    /// Materialize an instance from a template.
    ///
    /// Every step starts Pending with the request parameters and the given
    /// retry budget; the completion estimate is the sum of all step
    /// estimates from now.
    pub fn from_template(
        template: &WorkflowTemplate,
        parameters: Map<String, Value>,
        requester_id: Option<String>,
        priority: Priority,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        let steps: Vec<StepInstance> = template
            .steps
            .iter()
            .map(|s| StepInstance::from_template(s, parameters.clone(), max_retries))
            .collect();
        let estimate = now + ChronoDuration::milliseconds(template.total_estimated_ms() as i64);

        Self {
            workflow_id: WorkflowId::new(),
            kind: template.kind.clone(),
            status: WorkflowStatus::Running,
            steps,
            completed_step_ids: BTreeSet::new(),
            current_step_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            estimated_completion_at: Some(estimate),
            error: None,
            results: Map::new(),
            metadata: WorkflowMetadata {
                requester_id,
                priority,
                original_parameters: parameters,
            },
        }
    }

    /// Get a step by id.
    pub fn step(&self, id: &str) -> Option<&StepInstance> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Get a mutable step by id.
    pub fn step_mut(&mut self, id: &str) -> Option<&mut StepInstance> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Index of the next runnable step: the lowest-index Pending step all
    /// of whose dependencies are Completed or Skipped.
    pub fn next_runnable(&self) -> Option<usize> {
        self.steps.iter().position(|step| {
            step.status == StepStatus::Pending
                && step.depends_on.iter().all(|dep| {
                    self.step(dep).map(StepInstance::is_satisfied).unwrap_or(false)
                })
        })
    }

    /// Whether every step finished as Completed or Skipped.
    pub fn all_satisfied(&self) -> bool {
        self.steps.iter().all(StepInstance::is_satisfied)
    }

    /// The first step, in template order, that failed with no retry
    /// budget left.
    pub fn first_terminal_failure(&self) -> Option<&StepInstance> {
        self.steps.iter().find(|s| {
            matches!(s.status, StepStatus::Failed { .. }) && !s.can_retry()
        })
    }

    /// Progress as (finished, total), counting Completed and Skipped steps.
    pub fn progress(&self) -> (usize, usize) {
        let finished = self.steps.iter().filter(|s| s.is_satisfied()).count();
        (finished, self.steps.len())
    }

    /// Build the invocation payload for a step: the step's own parameters
    /// merged with the result of every dependency, keyed by dependency id.
    ///
    /// Dependencies without a stored result (Skipped steps restored from a
    /// snapshot that predates their completion) contribute nothing.
    pub fn build_payload(&self, step_id: &str) -> Map<String, Value> {
        let Some(step) = self.step(step_id) else {
            return Map::new();
        };
        let mut payload = step.parameters.clone();
        for dep_id in &step.depends_on {
            if let Some(result) = self.step(dep_id).and_then(|d| d.result.clone()) {
                payload.insert(dep_id.clone(), result);
            }
        }
        payload
    }

    /// Refresh derived bookkeeping after a mutation: `completed_step_ids`,
    /// the completion estimate, and the monotonic `updated_at` stamp.
    pub fn touch(&mut self) {
        self.completed_step_ids = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.id.clone())
            .collect();

        if self.status.is_terminal() {
            self.estimated_completion_at = None;
        } else {
            let remaining_ms: u64 = self
                .steps
                .iter()
                .filter(|s| !s.is_satisfied())
                .map(|s| s.estimated_duration_ms)
                .sum();
            self.estimated_completion_at =
                Some(Utc::now() + ChronoDuration::milliseconds(remaining_ms as i64));
        }

        // System clock steps backwards must not break the monotonic
        // ordering observed by broadcast consumers.
        self.updated_at = self.updated_at.max(Utc::now());
    }

    /// Finish the workflow as Completed, merging every step's result into
    /// `results` keyed by step id.
    pub fn finish_completed(&mut self) {
        self.status = WorkflowStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.current_step_id = None;
        self.results = self
            .steps
            .iter()
            .filter_map(|s| s.result.clone().map(|r| (s.id.clone(), r)))
            .collect();
        self.touch();
    }

    /// Finish the workflow as Failed, carrying the triggering step's error.
    pub fn finish_failed(&mut self, step_id: &str, error: &str) {
        self.status = WorkflowStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(format!("step '{}' failed: {}", step_id, error));
        self.touch();
    }

    /// Finish the workflow as Cancelled. The running step, if any, is
    /// marked failed with reason "cancelled" so nothing is left Running.
    pub fn finish_cancelled(&mut self) {
        if let Some(current) = self.current_step_id.clone() {
            if let Some(step) = self.step_mut(&current) {
                if step.status == StepStatus::Running {
                    step.fail("cancelled");
                }
            }
        }
        self.status = WorkflowStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.error = Some("cancelled".to_string());
        self.touch();
    }
}
