use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::NamePattern;
use crate::error::Result;
use crate::graph::{
    ObjectKey, ObjectRecord, ObjectType, ReferenceEdge, ReferenceKind, RelationshipGraph,
};

/// Which incoming edges keep an object alive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanRelevance {
    /// Edge kinds that never count as a use
    pub ignored_kinds: BTreeSet<ReferenceKind>,

    /// Whether an object referencing itself counts as used
    pub count_self_references: bool,
}

impl OrphanRelevance {
    pub fn counts(&self, edge: &ReferenceEdge) -> bool {
        if self.ignored_kinds.contains(&edge.kind) {
            return false;
        }
        self.count_self_references || !edge.is_self_reference()
    }
}

/// Parameters of one orphan scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Only consider these types; empty means every type except `root_types`
    pub type_filter: Vec<ObjectType>,

    /// Objects younger than this many days are not reported
    pub min_age_days: u32,

    /// Names matching any of these globs are not reported
    pub exclude_name_patterns: Vec<String>,

    pub relevance: OrphanRelevance,

    /// Types skipped when no type filter is given
    pub root_types: Vec<ObjectType>,

    /// Instant ages are measured against
    pub as_of: DateTime<Utc>,
}

impl ScanOptions {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            type_filter: vec![],
            min_age_days: 0,
            exclude_name_patterns: vec![],
            relevance: OrphanRelevance::default(),
            root_types: vec![],
            as_of,
        }
    }

    pub fn with_type(mut self, object_type: ObjectType) -> Self {
        self.type_filter.push(object_type);
        self
    }

    pub fn with_min_age_days(mut self, days: u32) -> Self {
        self.min_age_days = days;
        self
    }

    pub fn with_exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_name_patterns.push(pattern.into());
        self
    }

    pub fn with_ignored_kind(mut self, kind: ReferenceKind) -> Self {
        self.relevance.ignored_kinds.insert(kind);
        self
    }

    pub fn with_root_types(mut self, root_types: Vec<ObjectType>) -> Self {
        self.root_types = root_types;
        self
    }

    fn wants(&self, object_type: ObjectType) -> bool {
        if self.type_filter.is_empty() {
            !self.root_types.contains(&object_type)
        } else {
            self.type_filter.contains(&object_type)
        }
    }
}

/// Why an unreferenced object was admitted as a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "admission", rename_all = "snake_case")]
pub enum Admission {
    /// Creation time known and at least the minimum age
    OldEnough { age_days: i64, min_age_days: u32 },

    /// No creation time, so the age filter cannot exclude it
    AgeUnknown,
}

impl Admission {
    pub fn age_days(&self) -> Option<i64> {
        match self {
            Admission::OldEnough { age_days, .. } => Some(*age_days),
            Admission::AgeUnknown => None,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Admission::OldEnough {
                age_days,
                min_age_days,
            } => format!(
                "no references; age {} days >= minimum {} days",
                age_days, min_age_days
            ),
            Admission::AgeUnknown => "no references; creation date unknown".to_string(),
        }
    }
}

/// An object nothing uses
#[derive(Debug, Clone)]
pub struct OrphanCandidate {
    pub record: ObjectRecord,

    /// Qualifying incoming edges; always zero for a candidate
    pub incoming: usize,

    pub admission: Admission,
}

impl OrphanCandidate {
    pub fn key(&self) -> ObjectKey {
        self.record.key()
    }

    pub fn to_row(&self) -> OrphanRow {
        OrphanRow {
            object_type: self.record.object_type,
            id: self.record.id.clone(),
            name: self.record.name.clone(),
            age_days: self.admission.age_days(),
            admitted_reason: self.admission.reason(),
        }
    }
}

/// Flat, serializable form of a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRow {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub id: String,
    pub name: String,
    pub age_days: Option<i64>,
    pub admitted_reason: String,
}

/// Finds objects with no qualifying incoming references
pub struct OrphanDetector;

impl OrphanDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan the graph for orphan candidates, sorted by type, name and id.
    ///
    /// Fails only when an exclusion pattern is invalid.
    pub fn scan(
        &self,
        graph: &RelationshipGraph,
        options: &ScanOptions,
    ) -> Result<Vec<OrphanCandidate>> {
        let exclusions = NamePattern::compile_all(&options.exclude_name_patterns)?;

        let mut candidates = Vec::new();

        for record in graph.records() {
            if !options.wants(record.object_type) {
                continue;
            }

            let key = record.key();
            let incoming = qualifying_incoming(graph, &key, &options.relevance);
            if incoming > 0 {
                continue;
            }

            let admission = match record.age_in_days(options.as_of) {
                Some(age_days) if age_days < i64::from(options.min_age_days) => {
                    debug!("{} too young ({} days)", key, age_days);
                    continue;
                }
                Some(age_days) => Admission::OldEnough {
                    age_days,
                    min_age_days: options.min_age_days,
                },
                None => Admission::AgeUnknown,
            };

            if let Some(pattern) = exclusions.iter().find(|p| p.matches(&record.name)) {
                debug!("{} excluded by pattern '{}'", key, pattern);
                continue;
            }

            candidates.push(OrphanCandidate {
                record: record.clone(),
                incoming,
                admission,
            });
        }

        candidates.sort_by(|a, b| {
            (a.record.object_type, &a.record.name, &a.record.id)
                .cmp(&(b.record.object_type, &b.record.name, &b.record.id))
        });

        debug!("Found {} orphan candidates", candidates.len());

        Ok(candidates)
    }
}

impl Default for OrphanDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of incoming edges that keep `key` alive under `relevance`
pub fn qualifying_incoming(
    graph: &RelationshipGraph,
    key: &ObjectKey,
    relevance: &OrphanRelevance,
) -> usize {
    graph
        .reverse(key)
        .into_iter()
        .filter(|edge| relevance.counts(edge))
        .count()
}
