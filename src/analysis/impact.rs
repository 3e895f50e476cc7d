// Impact analysis: who breaks if an object is deleted
//
// The blast radius of an object is everything that reaches it through
// reverse edges. Reference chains can loop (a smart group that is a member
// of a group that is a member of the first one), so the walk is a queue plus
// a visited set rather than recursion.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::debug;

use crate::error::{AnalysisError, ConfigurationError, Result};
use crate::graph::{ObjectKey, ObjectType, RelationshipGraph};

/// Severity band of an impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upper bounds of the low and medium bands; anything above is high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub low_max: usize,
    pub medium_max: usize,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_max: 5,
            medium_max: 20,
        }
    }
}

impl RiskThresholds {
    pub fn new(low_max: usize, medium_max: usize) -> Result<Self, ConfigurationError> {
        let thresholds = Self { low_max, medium_max };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.low_max > self.medium_max {
            return Err(ConfigurationError::InvalidThresholds {
                low_max: self.low_max,
                medium_max: self.medium_max,
            });
        }
        Ok(())
    }

    /// Band for a number of affected objects. Non-decreasing in `total`.
    pub fn classify(&self, total: usize) -> RiskLevel {
        if total <= self.low_max {
            RiskLevel::Low
        } else if total <= self.medium_max {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// An object that depends on the assessed target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedObject {
    pub key: ObjectKey,
    pub name: String,

    /// Reverse-edge distance from the target, starting at 1
    pub depth: usize,

    /// The object through which this one was reached
    pub via: ObjectKey,
}

/// Blast radius of deleting one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactReport {
    pub target: ObjectKey,
    pub target_name: String,

    /// Objects referencing the target directly
    pub direct: Vec<AffectedObject>,

    /// Objects reaching the target through at least one intermediate
    pub transitive: Vec<AffectedObject>,

    pub risk_level: RiskLevel,
    pub total_count: usize,
}

impl ImpactReport {
    /// Direct then transitive, each ordered by depth and key
    pub fn affected(&self) -> impl Iterator<Item = &AffectedObject> {
        self.direct.iter().chain(self.transitive.iter())
    }

    pub fn direct_count(&self) -> usize {
        self.direct.len()
    }

    /// Number of affected objects per type
    pub fn by_type(&self) -> BTreeMap<ObjectType, usize> {
        let mut counts = BTreeMap::new();
        for affected in self.affected() {
            *counts.entry(affected.key.object_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_payload(&self) -> ImpactPayload {
        ImpactPayload {
            target: TargetRow {
                object_type: self.target.object_type,
                id: self.target.id.clone(),
                name: self.target_name.clone(),
            },
            risk_level: self.risk_level,
            direct_count: self.direct_count(),
            total_count: self.total_count,
            affected: self
                .affected()
                .map(|a| AffectedRow {
                    object_type: a.key.object_type,
                    id: a.key.id.clone(),
                    name: a.name.clone(),
                    depth: a.depth,
                })
                .collect(),
        }
    }
}

/// Serializable form of an [`ImpactReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactPayload {
    pub target: TargetRow,
    pub risk_level: RiskLevel,
    pub direct_count: usize,
    pub total_count: usize,
    pub affected: Vec<AffectedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRow {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedRow {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub id: String,
    pub name: String,
    pub depth: usize,
}

/// Computes blast radius and risk for objects in a graph
pub struct ImpactAnalyzer {
    thresholds: RiskThresholds,
}

impl ImpactAnalyzer {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    /// Assess the impact of deleting `target`.
    ///
    /// Fails with [`AnalysisError::NotFound`] when the target is not in the
    /// graph, and with a configuration error for inverted thresholds.
    pub fn assess(&self, graph: &RelationshipGraph, target: &ObjectKey) -> Result<ImpactReport> {
        self.thresholds.validate()?;

        let record = graph
            .get(target)
            .ok_or_else(|| AnalysisError::NotFound(target.clone()))?;

        let affected = dependents(graph, target);
        let total_count = affected.len();
        let (direct, transitive): (Vec<_>, Vec<_>) =
            affected.into_iter().partition(|a| a.depth == 1);

        let risk_level = self.thresholds.classify(total_count);
        debug!(
            "Impact of {}: {} direct, {} transitive, {} risk",
            target,
            direct.len(),
            transitive.len(),
            risk_level
        );

        Ok(ImpactReport {
            target: target.clone(),
            target_name: record.name.clone(),
            direct,
            transitive,
            risk_level,
            total_count,
        })
    }

    /// Assess several targets independently and in parallel.
    ///
    /// A missing target only fails its own entry.
    pub fn assess_batch(
        &self,
        graph: &RelationshipGraph,
        targets: &[ObjectKey],
    ) -> BTreeMap<ObjectKey, Result<ImpactReport>> {
        targets
            .par_iter()
            .map(|target| (target.clone(), self.assess(graph, target)))
            .collect()
    }
}

impl Default for ImpactAnalyzer {
    fn default() -> Self {
        Self::new(RiskThresholds::default())
    }
}

/// Breadth-first walk over reverse edges from `target`, which must be a node.
///
/// Returns every object that reaches the target, excluding the target itself,
/// ordered by depth and then key.
fn dependents(graph: &RelationshipGraph, target: &ObjectKey) -> Vec<AffectedObject> {
    let mut visited: HashSet<&ObjectKey> = HashSet::new();
    let mut queue: VecDeque<(&ObjectKey, usize)> = VecDeque::new();
    let mut affected = Vec::new();

    if let Some(start) = graph.key_ref(target) {
        visited.insert(start);
        queue.push_back((start, 0));
    }

    while let Some((current, depth)) = queue.pop_front() {
        for edge in graph.reverse(current) {
            let source = &edge.source;
            if !visited.insert(source) {
                continue;
            }

            let name = graph
                .get(source)
                .map(|record| record.name.clone())
                .unwrap_or_default();

            affected.push(AffectedObject {
                key: source.clone(),
                name,
                depth: depth + 1,
                via: current.clone(),
            });
            queue.push_back((source, depth + 1));
        }
    }

    affected.sort_by(|a, b| (a.depth, &a.key).cmp(&(b.depth, &b.key)));
    affected
}
