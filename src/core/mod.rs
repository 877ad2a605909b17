//! Core domain model for workflow orchestration.
//!
//! This module contains the data structures the scheduler drives:
//! step execution records and the workflow instance aggregate.

pub mod step;
pub mod workflow;

pub use step::{StepInstance, StepStatus};
pub use workflow::{
    Priority, WorkflowId, WorkflowInstance, WorkflowMetadata, WorkflowStatus,
};
