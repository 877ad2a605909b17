use std::time::Duration;

use thiserror::Error;

use crate::core::WorkflowId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Unknown workflow kind: {0}")]
    UnknownWorkflowKind(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("Workflow not active: {0}")]
    WorkflowNotActive(WorkflowId),

    #[error("Workflow {id} is {status} and cannot be resumed")]
    WorkflowNotResumable { id: WorkflowId, status: String },

    #[error("Step '{step_id}' execution failed: {message}")]
    StepExecution { step_id: String, message: String },

    #[error("Workflow {id} failed at step '{step_id}': {message}")]
    WorkflowFailed {
        id: WorkflowId,
        step_id: String,
        message: String,
    },

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Worker invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store error: {0}")]
    Store(String),

    #[error("No home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, Error>;
