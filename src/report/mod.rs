mod json;
mod terminal;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

use crate::analysis::{ImpactReport, OrphanCandidate, ReferenceCycle};
use crate::error::{AnalysisError, BuildWarning};
use crate::graph::{ObjectKey, ObjectRecord, ReferenceEdge, RelationshipGraph};
use miette::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

/// Which side of an object's references a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// What the object references
    Uses,
    /// What references the object
    UsedBy,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Uses => "uses",
            Direction::UsedBy => "used-by",
        }
    }

    /// The edge end on the far side from the queried object
    pub fn other_end<'a>(&self, edge: &'a ReferenceEdge) -> &'a ObjectKey {
        match self {
            Direction::Uses => &edge.target,
            Direction::UsedBy => &edge.source,
        }
    }

    /// Record on the far side of a resolved edge. A dangling edge's target
    /// key is built from the reference value and may collide with a real id.
    pub fn other_record<'g>(
        &self,
        graph: &'g RelationshipGraph,
        edge: &ReferenceEdge,
    ) -> Option<&'g ObjectRecord> {
        if edge.unresolved {
            return None;
        }
        graph.get(self.other_end(edge))
    }
}

/// Per-target outcome of a batch impact assessment
pub type ImpactResults = BTreeMap<ObjectKey, Result<ImpactReport, AnalysisError>>;

/// Reporter for outputting analysis results
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,

    /// List each build warning in terminal output
    show_warnings: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self {
            format,
            output_path,
            show_warnings: true,
        }
    }

    pub fn with_warnings(mut self, show: bool) -> Self {
        self.show_warnings = show;
        self
    }

    pub fn report_orphans(
        &self,
        orphans: &[OrphanCandidate],
        warnings: &[BuildWarning],
    ) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => self.terminal().report_orphans(orphans, warnings),
            ReportFormat::Json => self.json().report_orphans(orphans, warnings),
        }
    }

    pub fn report_impacts(&self, results: &ImpactResults, warnings: &[BuildWarning]) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => self.terminal().report_impacts(results, warnings),
            ReportFormat::Json => self.json().report_impacts(results, warnings),
        }
    }

    pub fn report_edges(
        &self,
        graph: &RelationshipGraph,
        key: &ObjectKey,
        direction: Direction,
        warnings: &[BuildWarning],
    ) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => {
                self.terminal().report_edges(graph, key, direction, warnings)
            }
            ReportFormat::Json => self.json().report_edges(graph, key, direction, warnings),
        }
    }

    pub fn report_cycles(
        &self,
        cycles: &[ReferenceCycle],
        warnings: &[BuildWarning],
    ) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => self.terminal().report_cycles(cycles, warnings),
            ReportFormat::Json => self.json().report_cycles(cycles, warnings),
        }
    }

    fn terminal(&self) -> TerminalReporter {
        TerminalReporter::new().with_warnings(self.show_warnings)
    }

    fn json(&self) -> JsonReporter {
        JsonReporter::new(self.output_path.clone())
    }
}
