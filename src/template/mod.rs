//! Workflow templates and the registry that resolves them.
//!
//! A template is the static blueprint for one workflow kind: an ordered
//! list of step definitions whose dependencies form a DAG. The registry
//! maps kinds to templates and is read-only after startup.

mod model;
mod registry;

pub use model::{StepTemplate, WorkflowTemplate};
pub use registry::TemplateRegistry;
