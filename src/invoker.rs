//! Worker invoker collaborator contract.
//!
//! The engine never executes a step's work itself; it hands the step's
//! payload to a worker and awaits the outcome. The transport behind a
//! worker (HTTP, queue, in-process) is the embedder's concern.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Executes one step's unit of work.
///
/// Invocations are awaited by the execution loop and bounded by the
/// per-worker-type timeout from [`EngineConfig`](crate::config::EngineConfig).
/// Idempotence is NOT assumed: a retried step re-executes the worker's side
/// effects, so workers needing exactly-once semantics must deduplicate
/// themselves.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    /// Execute a unit of work of the given worker type.
    ///
    /// The payload is the step's parameters merged with its dependencies'
    /// results, keyed by dependency step id.
    ///
    /// # Errors
    /// Any error is treated as a step failure and is subject to the
    /// step's retry policy.
    async fn invoke(&self, worker_type: &str, payload: Map<String, Value>) -> Result<Value>;
}
