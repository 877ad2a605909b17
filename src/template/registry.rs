//! Template registry.
//!
//! Read-only map from workflow kind to its validated template. Populated
//! once at startup; the engine only resolves, never mutates.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::model::{StepTemplate, WorkflowTemplate};

/// Resolves workflow kinds to their templates.
pub struct TemplateRegistry {
    templates: HashMap<String, WorkflowTemplate>,
}

impl TemplateRegistry {
    /// Build a registry from pre-validated templates.
    pub fn new(templates: Vec<WorkflowTemplate>) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| (t.kind.clone(), t))
            .collect();
        Self { templates }
    }

    /// Registry with the production workflow kinds.
    pub fn builtin() -> Self {
        let templates = vec![
            curriculum_analysis(),
            peer_comparison(),
            gap_analysis(),
        ];
        Self::new(templates)
    }

    /// Resolve a kind to its template.
    ///
    /// # Errors
    /// Returns `Error::UnknownWorkflowKind` if the kind is not registered.
    /// Callers of `Scheduler::start` surface this to the requester; it is
    /// never retried.
    pub fn resolve(&self, kind: &str) -> Result<&WorkflowTemplate> {
        self.templates
            .get(kind)
            .ok_or_else(|| Error::UnknownWorkflowKind(kind.to_string()))
    }

    /// All registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Full curriculum analysis: ingest the catalog, parse courses and
/// requirements in parallel branches, map learning outcomes, compile
/// the report.
fn curriculum_analysis() -> WorkflowTemplate {
    WorkflowTemplate::new(
        "curriculum_analysis",
        vec![
            StepTemplate::new("ingest_catalog", "Ingest course catalog", "catalog_ingest", 4_000),
            StepTemplate::new("parse_courses", "Parse course descriptions", "course_parser", 12_000)
                .depends_on("ingest_catalog"),
            StepTemplate::new(
                "extract_requirements",
                "Extract degree requirements",
                "requirement_extractor",
                8_000,
            )
            .depends_on("ingest_catalog"),
            StepTemplate::new("map_outcomes", "Map learning outcomes", "outcome_mapper", 10_000)
                .depends_on("parse_courses")
                .depends_on("extract_requirements"),
            StepTemplate::new("compile_report", "Compile analysis report", "report_builder", 6_000)
                .depends_on("map_outcomes"),
        ],
    )
    .expect("builtin curriculum_analysis template is valid")
}

/// Peer comparison: align the parsed catalog against peer programs.
fn peer_comparison() -> WorkflowTemplate {
    WorkflowTemplate::new(
        "peer_comparison",
        vec![
            StepTemplate::new("ingest_catalog", "Ingest course catalog", "catalog_ingest", 4_000),
            StepTemplate::new("parse_courses", "Parse course descriptions", "course_parser", 12_000)
                .depends_on("ingest_catalog"),
            StepTemplate::new(
                "fetch_peer_programs",
                "Fetch peer program catalogs",
                "peer_search",
                15_000,
            ),
            StepTemplate::new("align_courses", "Align courses to peers", "alignment_scorer", 9_000)
                .depends_on("parse_courses")
                .depends_on("fetch_peer_programs"),
            StepTemplate::new("compile_report", "Compile comparison report", "report_builder", 6_000)
                .depends_on("align_courses"),
        ],
    )
    .expect("builtin peer_comparison template is valid")
}

/// Gap analysis: detect and rank coverage gaps against accreditation
/// standards.
fn gap_analysis() -> WorkflowTemplate {
    WorkflowTemplate::new(
        "gap_analysis",
        vec![
            StepTemplate::new("ingest_catalog", "Ingest course catalog", "catalog_ingest", 4_000),
            StepTemplate::new("parse_courses", "Parse course descriptions", "course_parser", 12_000)
                .depends_on("ingest_catalog"),
            StepTemplate::new("load_standards", "Load accreditation standards", "standards_loader", 3_000),
            StepTemplate::new("detect_gaps", "Detect coverage gaps", "gap_detector", 11_000)
                .depends_on("parse_courses")
                .depends_on("load_standards"),
            StepTemplate::new("rank_gaps", "Rank gaps by severity", "gap_ranker", 5_000)
                .depends_on("detect_gaps"),
            StepTemplate::new("compile_report", "Compile gap report", "report_builder", 6_000)
                .depends_on("rank_gaps"),
        ],
    )
    .expect("builtin gap_analysis template is valid")
}
