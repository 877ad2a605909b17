//! Workflow template data model.
//!
//! Templates are the static blueprints a workflow instance is materialized
//! from: an ordered list of step definitions whose dependency relation must
//! form a DAG. Templates are pure data and never change after validation.

use std::collections::HashMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Static definition of one step within a workflow kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    /// Identifier, unique within the template.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Worker type that executes instances of this step.
    pub worker_type: String,
    /// Ids of steps in the same template that must finish first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Estimate of how long one execution takes.
    pub estimated_duration_ms: u64,
}

impl StepTemplate {
    /// Create a step template with no dependencies.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        worker_type: impl Into<String>,
        estimated_duration_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            worker_type: worker_type.into(),
            depends_on: Vec::new(),
            estimated_duration_ms,
        }
    }

    /// Add a dependency on another step in the same template.
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }
}

/// Ordered set of step templates for one workflow kind.
///
/// Construction validates the structural invariants: step ids are unique,
/// every dependency references a step in the same template, and the
/// dependency relation is acyclic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// The workflow kind this template defines.
    pub kind: String,
    /// Steps in definition order. The execution loop scans this order
    /// when selecting the next runnable step.
    pub steps: Vec<StepTemplate>,
}

impl WorkflowTemplate {
    /// Create and validate a template.
    ///
    /// # Errors
    /// Returns `Error::InvalidTemplate` if the template is empty, a step id
    /// is duplicated, a dependency references an unknown step, or the
    /// dependency relation contains a cycle.
    pub fn new(kind: impl Into<String>, steps: Vec<StepTemplate>) -> Result<Self> {
        let kind = kind.into();
        if steps.is_empty() {
            return Err(Error::InvalidTemplate(format!(
                "template '{}' has no steps",
                kind
            )));
        }

        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for step in &steps {
            if indices.contains_key(step.id.as_str()) {
                return Err(Error::InvalidTemplate(format!(
                    "template '{}' defines step '{}' more than once",
                    kind, step.id
                )));
            }
            let index = graph.add_node(step.id.as_str());
            indices.insert(step.id.as_str(), index);
        }

        for step in &steps {
            for dep in &step.depends_on {
                let Some(&dep_index) = indices.get(dep.as_str()) else {
                    return Err(Error::InvalidTemplate(format!(
                        "step '{}' in template '{}' depends on unknown step '{}'",
                        step.id, kind, dep
                    )));
                };
                graph.add_edge(dep_index, indices[step.id.as_str()], ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(Error::InvalidTemplate(format!(
                "dependency cycle in template '{}'",
                kind
            )));
        }

        Ok(Self { kind, steps })
    }

    /// Get a step template by id.
    pub fn step(&self, id: &str) -> Option<&StepTemplate> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Number of steps in the template.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the template has no steps. Always false for validated
    /// templates; present for completeness of the collection-like API.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all step duration estimates.
    pub fn total_estimated_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.estimated_duration_ms).sum()
    }
}
