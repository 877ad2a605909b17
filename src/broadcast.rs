//! Progress broadcaster collaborator contract and shipped adapters.
//!
//! The engine publishes a status snapshot after every state change.
//! Delivery is best-effort: a failed publish is logged by the execution
//! loop and never fails the workflow.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::WorkflowInstance;
use crate::error::{Error, Result};

/// Publishes workflow status snapshots to external listeners.
#[async_trait]
pub trait ProgressBroadcaster: Send + Sync {
    /// Publish one snapshot.
    ///
    /// # Errors
    /// Errors are advisory; the execution loop logs them and continues.
    async fn publish(&self, snapshot: &WorkflowInstance) -> Result<()>;
}

/// Broadcaster that discards every snapshot.
///
/// For embedders that poll `Scheduler::status` instead of subscribing.
#[derive(Default)]
pub struct NoopBroadcaster;

#[async_trait]
impl ProgressBroadcaster for NoopBroadcaster {
    async fn publish(&self, _snapshot: &WorkflowInstance) -> Result<()> {
        Ok(())
    }
}

/// Broadcaster over a bounded tokio channel.
///
/// Uses `try_send` so a slow or absent consumer never stalls the
/// execution loop; a full channel drops the snapshot (the next one
/// supersedes it anyway).
pub struct ChannelBroadcaster {
    tx: mpsc::Sender<WorkflowInstance>,
}

impl ChannelBroadcaster {
    /// Create a broadcaster and the receiving end for the consumer.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WorkflowInstance>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressBroadcaster for ChannelBroadcaster {
    async fn publish(&self, snapshot: &WorkflowInstance) -> Result<()> {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(
                    workflow_id = %snapshot.workflow_id,
                    "broadcast channel full, snapshot dropped"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::Store(
                "broadcast channel closed".to_string(),
            )),
        }
    }
}
