//! Workflow store collaborator contract and shipped adapters.
//!
//! The store is the durable home of workflow snapshots, keyed by workflow
//! id with upsert semantics. The engine persists after every state change
//! and reads back on `status` fallback and `resume`. The in-memory copy is
//! always the most current; store failures are surfaced to the caller as
//! errors but the execution loop treats them as warnings only.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{WorkflowId, WorkflowInstance};
use crate::error::{Error, Result};

/// Durable persistence for workflow snapshots.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Upsert a snapshot keyed by its workflow id.
    async fn save(&self, instance: &WorkflowInstance) -> Result<()>;

    /// Load a snapshot, or `None` if the id was never persisted.
    async fn load(&self, id: WorkflowId) -> Result<Option<WorkflowInstance>>;
}

/// Non-durable store over a shared map.
///
/// Suitable for tests and embedders that handle durability elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<WorkflowId, WorkflowInstance>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn save(&self, instance: &WorkflowInstance) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(instance.workflow_id, instance.clone());
        Ok(())
    }

    async fn load(&self, id: WorkflowId) -> Result<Option<WorkflowInstance>> {
        Ok(self.snapshots.read().await.get(&id).cloned())
    }
}

/// File-backed store: one pretty-printed JSON document per workflow under
/// a state directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the default state directory,
    /// `~/.curricle/workflows`.
    pub fn default_dir() -> Result<Self> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;
        Ok(Self::new(home.join(".curricle").join("workflows")))
    }

    /// Store rooted at the configured state directory: the `state_dir`
    /// override when set, the default otherwise.
    pub fn from_config(config: &crate::config::EngineConfig) -> Result<Self> {
        match &config.state_dir {
            Some(dir) => Ok(Self::new(dir)),
            None => Self::default_dir(),
        }
    }

    fn path_for(&self, id: WorkflowId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl WorkflowStore for JsonFileStore {
    async fn save(&self, instance: &WorkflowInstance) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(instance)?;
        tokio::fs::write(self.path_for(instance.workflow_id), json).await?;
        Ok(())
    }

    async fn load(&self, id: WorkflowId) -> Result<Option<WorkflowInstance>> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let instance: WorkflowInstance = serde_json::from_str(&content)?;
        Ok(Some(instance))
    }
}
