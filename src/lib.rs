//! curricle - workflow orchestration engine for curriculum analysis.
//!
//! The engine decomposes an analysis request into a DAG of typed steps,
//! executes them against remote workers with retry and backoff, tracks
//! progress, persists every state change durably, and broadcasts status
//! snapshots to observers.
//!
//! # Architecture
//!
//! - [`template`]: static blueprints (step definitions per workflow kind)
//!   and the registry that resolves them
//! - [`core`]: the data model — step records and the workflow instance
//!   aggregate
//! - [`scheduler`]: the engine proper — start/status/stop/resume and one
//!   execution loop per active workflow
//! - [`invoker`], [`store`], [`broadcast`]: collaborator contracts for
//!   worker execution, durable snapshots, and progress publication
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use curricle::{
//!     EngineConfig, MemoryStore, NoopBroadcaster, Scheduler, StartRequest,
//!     TemplateRegistry,
//! };
//!
//! let scheduler = Scheduler::new(
//!     Arc::new(TemplateRegistry::builtin()),
//!     Arc::new(my_invoker),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NoopBroadcaster),
//!     EngineConfig::default(),
//! );
//!
//! let snapshot = scheduler
//!     .start(StartRequest::new("curriculum_analysis"))
//!     .await?;
//! println!("started {}", snapshot.workflow_id.short());
//! ```

pub mod broadcast;
pub mod config;
pub mod core;
pub mod error;
pub mod invoker;
pub mod scheduler;
pub mod store;
pub mod template;

pub use broadcast::{ChannelBroadcaster, NoopBroadcaster, ProgressBroadcaster};
pub use config::EngineConfig;
pub use core::{
    Priority, StepInstance, StepStatus, WorkflowId, WorkflowInstance, WorkflowMetadata,
    WorkflowStatus,
};
pub use error::{Error, Result};
pub use invoker::WorkerInvoker;
pub use scheduler::{Scheduler, StartRequest};
pub use store::{JsonFileStore, MemoryStore, WorkflowStore};
pub use template::{StepTemplate, TemplateRegistry, WorkflowTemplate};
