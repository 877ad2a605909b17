//! Step execution records.
//!
//! A `StepInstance` is the mutable execution record derived from a
//! `StepTemplate` when a workflow is materialized. It tracks status,
//! retry accounting, timing, and the worker's result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::template::StepTemplate;

/// Step status in its lifecycle.
///
/// Steps progress through these states as the execution loop selects,
/// runs, retries, and finishes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum StepStatus {
    /// Step is waiting for its dependencies (or for a retry slot).
    Pending,
    /// Step is currently being executed by a worker.
    Running,
    /// Step completed successfully.
    Completed,
    /// Step failed with an error. Terminal only once retries are exhausted.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
    /// Step was satisfied without running (previously completed work
    /// restored by `resume`).
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed { error } => write!(f, "failed: {}", error),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Mutable execution record for one step of a workflow instance.
///
/// The identity fields (`id`, `name`, `worker_type`, `depends_on`,
/// `estimated_duration_ms`) mirror the step's template at creation time
/// and never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInstance {
    /// Template-defined identifier, unique within the workflow.
    pub id: String,
    /// Human-readable name for the step.
    pub name: String,
    /// Worker type that executes this step.
    pub worker_type: String,
    /// Ids of steps that must finish before this step can run.
    pub depends_on: Vec<String>,
    /// Current execution status.
    pub status: StepStatus,
    /// Step-specific invocation parameters.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Result returned by the worker on success.
    pub result: Option<Value>,
    /// Error from the most recent failed attempt.
    pub error: Option<String>,
    /// When the most recent attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the most recent attempt finished (success or failure).
    pub ended_at: Option<DateTime<Utc>>,
    /// Coarse progress indicator, 0-100.
    pub progress_percent: Option<u8>,
    /// Number of retries consumed so far.
    pub retry_count: u32,
    /// Maximum retries allowed for this step.
    pub max_retries: u32,
    /// Template estimate of how long the step takes.
    pub estimated_duration_ms: u64,
    /// Measured duration of the most recent attempt.
    pub actual_duration_ms: Option<u64>,
}

impl StepInstance {
    /// Materialize an execution record from a template step.
    ///
    /// The record starts Pending with the given parameters and retry
    /// budget; all timing and result fields are empty.
    pub fn from_template(
        template: &StepTemplate,
        parameters: Map<String, Value>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            worker_type: template.worker_type.clone(),
            depends_on: template.depends_on.clone(),
            status: StepStatus::Pending,
            parameters,
            result: None,
            error: None,
            started_at: None,
            ended_at: None,
            progress_percent: None,
            retry_count: 0,
            max_retries,
            estimated_duration_ms: template.estimated_duration_ms,
            actual_duration_ms: None,
        }
    }

    /// Start an attempt.
    ///
    /// Transitions status to Running and records the start time.
    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
        self.ended_at = None;
    }

    /// Record a successful attempt.
    ///
    /// Transitions status to Completed, stores the worker result, and
    /// closes out the timing fields.
    pub fn complete(&mut self, result: Value) {
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.progress_percent = Some(100);
        self.finish_timing();
    }

    /// Record a failed attempt.
    ///
    /// Transitions status to Failed with the error and closes out the
    /// timing fields. Whether the failure is terminal depends on the
    /// remaining retry budget, see [`can_retry`](Self::can_retry).
    pub fn fail(&mut self, error: &str) {
        self.status = StepStatus::Failed {
            error: error.to_string(),
        };
        self.error = Some(error.to_string());
        self.finish_timing();
    }

    /// Mark the step as satisfied without running it.
    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
        self.progress_percent = Some(100);
    }

    /// Consume one retry and return the step to Pending for reselection.
    pub fn reset_for_retry(&mut self) {
        self.retry_count += 1;
        self.status = StepStatus::Pending;
        self.progress_percent = None;
    }

    /// Whether a failed step still has retry budget.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Whether the step counts as satisfied for dependents.
    pub fn is_satisfied(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Skipped)
    }

    /// Whether the step is in a state it can never leave.
    ///
    /// A Failed step is terminal only once its retries are exhausted.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            StepStatus::Completed | StepStatus::Skipped => true,
            StepStatus::Failed { .. } => !self.can_retry(),
            _ => false,
        }
    }

    fn finish_timing(&mut self) {
        let ended = Utc::now();
        self.ended_at = Some(ended);
        if let Some(started) = self.started_at {
            let millis = (ended - started).num_milliseconds().max(0) as u64;
            self.actual_duration_ms = Some(millis);
        }
    }
}
