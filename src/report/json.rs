use super::{Direction, ImpactResults};
use crate::analysis::{ImpactPayload, OrphanCandidate, OrphanRow, ReferenceCycle};
use crate::error::BuildWarning;
use crate::graph::{ObjectKey, ObjectType, ReferenceEdge, ReferenceKind, RelationshipGraph};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::path::PathBuf;

const REPORT_VERSION: &str = "1.0";

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report_orphans(
        &self,
        orphans: &[OrphanCandidate],
        warnings: &[BuildWarning],
    ) -> Result<()> {
        self.write(&orphan_report(orphans, warnings))
    }

    pub fn report_impacts(&self, results: &ImpactResults, warnings: &[BuildWarning]) -> Result<()> {
        self.write(&impact_report(results, warnings))
    }

    pub fn report_edges(
        &self,
        graph: &RelationshipGraph,
        key: &ObjectKey,
        direction: Direction,
        warnings: &[BuildWarning],
    ) -> Result<()> {
        self.write(&edge_report(graph, key, direction, warnings))
    }

    pub fn report_cycles(
        &self,
        cycles: &[ReferenceCycle],
        warnings: &[BuildWarning],
    ) -> Result<()> {
        self.write(&CycleReport {
            version: REPORT_VERSION,
            command: "cycles",
            total: cycles.len(),
            cycles,
            warnings,
        })
    }

    fn write<T: Serialize>(&self, report: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(report).into_diagnostic()?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write report: {}", path.display()))?;
            eprintln!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct OrphanReport<'a> {
    version: &'static str,
    command: &'static str,
    total: usize,
    orphans: Vec<OrphanRow>,
    warnings: &'a [BuildWarning],
}

#[derive(Serialize)]
struct ImpactReportDoc<'a> {
    version: &'static str,
    command: &'static str,
    reports: Vec<ImpactPayload>,
    errors: Vec<TargetError>,
    warnings: &'a [BuildWarning],
}

#[derive(Serialize)]
struct TargetError {
    target: ObjectKey,
    message: String,
}

#[derive(Serialize)]
struct EdgeReport<'a> {
    version: &'static str,
    command: &'static str,
    object: ObjectKey,
    name: Option<String>,
    total: usize,
    references: Vec<EdgeRow>,
    warnings: &'a [BuildWarning],
}

#[derive(Serialize)]
struct EdgeRow {
    #[serde(rename = "type")]
    object_type: ObjectType,
    id: String,
    name: Option<String>,
    kind: ReferenceKind,
    unresolved: bool,
}

#[derive(Serialize)]
struct CycleReport<'a> {
    version: &'static str,
    command: &'static str,
    total: usize,
    cycles: &'a [ReferenceCycle],
    warnings: &'a [BuildWarning],
}

fn orphan_report<'a>(
    orphans: &[OrphanCandidate],
    warnings: &'a [BuildWarning],
) -> OrphanReport<'a> {
    OrphanReport {
        version: REPORT_VERSION,
        command: "orphans",
        total: orphans.len(),
        orphans: orphans.iter().map(OrphanCandidate::to_row).collect(),
        warnings,
    }
}

fn impact_report<'a>(results: &ImpactResults, warnings: &'a [BuildWarning]) -> ImpactReportDoc<'a> {
    let mut reports = Vec::new();
    let mut errors = Vec::new();

    for (target, result) in results {
        match result {
            Ok(report) => reports.push(report.to_payload()),
            Err(err) => errors.push(TargetError {
                target: target.clone(),
                message: err.to_string(),
            }),
        }
    }

    ImpactReportDoc {
        version: REPORT_VERSION,
        command: "impact",
        reports,
        errors,
        warnings,
    }
}

fn edge_report<'a>(
    graph: &RelationshipGraph,
    key: &ObjectKey,
    direction: Direction,
    warnings: &'a [BuildWarning],
) -> EdgeReport<'a> {
    let edges = match direction {
        Direction::Uses => graph.forward(key),
        Direction::UsedBy => graph.reverse(key),
    };

    let references: Vec<EdgeRow> = edges
        .into_iter()
        .map(|edge: &ReferenceEdge| {
            let other = direction.other_end(edge);
            EdgeRow {
                object_type: other.object_type,
                id: other.id.clone(),
                name: direction.other_record(graph, edge).map(|r| r.name.clone()),
                kind: edge.kind,
                unresolved: edge.unresolved,
            }
        })
        .collect();

    EdgeReport {
        version: REPORT_VERSION,
        command: direction.as_str(),
        object: key.clone(),
        name: graph.get(key).map(|r| r.name.clone()),
        total: references.len(),
        references,
        warnings,
    }
}
