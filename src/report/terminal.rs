use super::{Direction, ImpactResults};
use crate::analysis::{ImpactReport, OrphanCandidate, ReferenceCycle, RiskLevel};
use crate::error::BuildWarning;
use crate::graph::{ObjectKey, ObjectType, RelationshipGraph};
use colored::Colorize;
use miette::Result;
use std::collections::BTreeMap;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// Print every build warning instead of a count
    show_warnings: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
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
        self.print_warnings(warnings);

        if orphans.is_empty() {
            println!("{}", "No orphaned objects found!".green().bold());
            return Ok(());
        }

        // Group by type
        let mut by_type: BTreeMap<ObjectType, Vec<&OrphanCandidate>> = BTreeMap::new();
        for orphan in orphans {
            by_type.entry(orphan.record.object_type).or_default().push(orphan);
        }

        println!();
        println!(
            "{}",
            format!("Found {} orphaned objects:", orphans.len()).yellow().bold()
        );
        println!();

        for (object_type, items) in &by_type {
            println!(
                "{}",
                format!("{} ({})", object_type.display_name(), items.len()).cyan().bold()
            );

            for orphan in items {
                let age = match orphan.admission.age_days() {
                    Some(days) => format!("{} days", days),
                    None => "age unknown".to_string(),
                };
                println!(
                    "  {} {} {}",
                    format!("{:>8}", orphan.record.id).dimmed(),
                    orphan.record.name.white(),
                    format!("({})", age).dimmed()
                );
            }

            println!();
        }

        println!("{}", "─".repeat(60).dimmed());
        let parts: Vec<String> = by_type
            .iter()
            .map(|(object_type, items)| format!("{} {}", items.len(), object_type.display_name()))
            .collect();
        println!("Summary: {}", parts.join(", "));
        println!(
            "{}",
            "Tip: Run `impact TYPE:ID` before deleting anything".dimmed()
        );

        Ok(())
    }

    pub fn report_impacts(&self, results: &ImpactResults, warnings: &[BuildWarning]) -> Result<()> {
        self.print_warnings(warnings);

        for (target, result) in results {
            match result {
                Ok(report) => self.print_impact(report),
                Err(err) => {
                    println!("{} {}", "✗".red().bold(), format!("{}: {}", target, err).red());
                    println!();
                }
            }
        }

        Ok(())
    }

    fn print_impact(&self, report: &ImpactReport) {
        let risk = match report.risk_level {
            RiskLevel::Low => "LOW".green().bold(),
            RiskLevel::Medium => "MEDIUM".yellow().bold(),
            RiskLevel::High => "HIGH".red().bold(),
        };

        println!(
            "{} '{}' ({})",
            "Impact of deleting".bold(),
            report.target_name.white().bold(),
            report.target.to_string().dimmed()
        );
        println!(
            "  Risk: {}  direct: {}  total: {}",
            risk,
            report.direct_count(),
            report.total_count
        );

        if report.total_count == 0 {
            println!("  {}", "Nothing depends on this object".green());
            println!();
            return;
        }

        for affected in report.affected() {
            let indent = "  ".repeat(affected.depth);
            let via = if affected.depth > 1 {
                format!(" via {}", affected.via).dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "  {}{} {} '{}' {}{}",
                indent,
                "←".dimmed(),
                affected.key.object_type.display_name().dimmed(),
                affected.name.white(),
                format!("({})", affected.key).dimmed(),
                via
            );
        }

        let by_type: Vec<String> = report
            .by_type()
            .iter()
            .map(|(object_type, count)| format!("{} {}", count, object_type.display_name()))
            .collect();
        println!("  {} {}", "By type:".dimmed(), by_type.join(", "));
        println!();
    }

    pub fn report_edges(
        &self,
        graph: &RelationshipGraph,
        key: &ObjectKey,
        direction: Direction,
        warnings: &[BuildWarning],
    ) -> Result<()> {
        self.print_warnings(warnings);

        let edges = match direction {
            Direction::Uses => graph.forward(key),
            Direction::UsedBy => graph.reverse(key),
        };

        let title = graph
            .get(key)
            .map(|record| record.display())
            .unwrap_or_else(|| key.to_string());

        let heading = match direction {
            Direction::Uses => format!("{} uses {} objects:", title, edges.len()),
            Direction::UsedBy => format!("{} is used by {} objects:", title, edges.len()),
        };
        println!("{}", heading.bold());

        for edge in &edges {
            let other = direction.other_end(edge);
            let name = match direction.other_record(graph, edge) {
                Some(record) => record.name.white().to_string(),
                None => "(not in snapshot)".red().to_string(),
            };
            println!(
                "  {} {} {} {}",
                format!("[{}]", edge.kind).dimmed(),
                other.object_type.display_name(),
                name,
                format!("({})", other).dimmed()
            );
        }

        Ok(())
    }

    pub fn report_cycles(
        &self,
        cycles: &[ReferenceCycle],
        warnings: &[BuildWarning],
    ) -> Result<()> {
        self.print_warnings(warnings);

        if cycles.is_empty() {
            println!("{}", "No reference cycles found!".green().bold());
            return Ok(());
        }

        println!(
            "{}",
            format!("Found {} reference cycles:", cycles.len()).yellow().bold()
        );
        println!();

        for (i, cycle) in cycles.iter().enumerate() {
            println!("{}", format!("Cycle {} ({} objects)", i + 1, cycle.size).cyan().bold());
            for (key, name) in cycle.members.iter().zip(&cycle.names) {
                println!(
                    "  {} '{}' {}",
                    key.object_type.display_name(),
                    name,
                    format!("({})", key).dimmed()
                );
            }
            println!();
        }

        Ok(())
    }

    /// Build warnings go to stderr so stdout stays parseable
    fn print_warnings(&self, warnings: &[BuildWarning]) {
        if warnings.is_empty() {
            return;
        }

        eprintln!(
            "{}",
            format!("{} warnings while building the graph", warnings.len()).yellow()
        );
        if self.show_warnings {
            for warning in warnings {
                eprintln!("  {} {}", format!("[{}]", warning.code()).dimmed(), warning);
            }
        }
        eprintln!();
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
