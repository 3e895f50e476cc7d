// Graph builder: parallel extraction, single-writer merge

use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::{
    ExtractionRuleSet, ObjectKey, ObjectRecord, Reference, ReferenceEdge, RelationshipGraph,
    Selector,
};
use crate::error::{BuildWarning, PartialRecordError};

/// Builder for constructing the relationship graph
pub struct GraphBuilder<'a> {
    rules: &'a ExtractionRuleSet,

    /// Extract references on the rayon pool
    parallel: bool,
}

/// Extraction output for one record
type Extracted = Result<Vec<Reference>, PartialRecordError>;

impl<'a> GraphBuilder<'a> {
    pub fn new(rules: &'a ExtractionRuleSet) -> Self {
        Self {
            rules,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Build the graph for one snapshot.
    ///
    /// The result depends only on the set of records and the rules: records
    /// are put in key order first, and per-record extraction results are
    /// merged in that order regardless of how the map phase was scheduled.
    pub fn build(&self, records: Vec<ObjectRecord>) -> RelationshipGraph {
        info!("Building graph from {} records...", records.len());

        let mut graph = RelationshipGraph::new();
        let records = self.canonicalize(records, &mut graph);

        // Map phase: each record is extracted independently
        let extracted: Vec<Extracted> = if self.parallel {
            records.par_iter().map(|record| self.extract(record)).collect()
        } else {
            records.iter().map(|record| self.extract(record)).collect()
        };

        // Merge phase: this thread is the only writer
        let sources: Vec<ObjectKey> = records.iter().map(ObjectRecord::key).collect();
        for record in records {
            graph.add_record(record);
        }

        let mut edges = BTreeSet::new();
        let mut unresolved = BTreeSet::new();
        let mut partial = Vec::new();

        for (source, result) in sources.iter().zip(extracted) {
            let references = match result {
                Ok(references) => references,
                Err(err) => {
                    warn!("Skipping references of {}: {}", source, err);
                    partial.push(BuildWarning::PartialRecord(err));
                    continue;
                }
            };

            for reference in references {
                let targets = resolve(&graph, &reference);
                if targets.is_empty() {
                    if reference.keep_unresolved {
                        let target = ObjectKey::new(
                            reference.target_type,
                            reference.selector.value().to_string(),
                        );
                        unresolved.insert(
                            ReferenceEdge::new(source.clone(), target, reference.kind).unresolved(),
                        );
                    }
                    continue;
                }
                for target in targets {
                    edges.insert(ReferenceEdge::new(source.clone(), target, reference.kind));
                }
            }
        }

        for warning in partial {
            graph.push_warning(warning);
        }
        for edge in &unresolved {
            graph.push_warning(BuildWarning::UnresolvedReference {
                source: edge.source.clone(),
                target: edge.target.clone(),
                kind: edge.kind,
            });
        }

        info!(
            "Graph has {} objects, {} references, {} unresolved",
            graph.node_count(),
            edges.len(),
            unresolved.len()
        );

        for edge in edges.into_iter().chain(unresolved) {
            graph.add_edge(edge);
        }

        graph
    }

    /// Sort records into a total order and drop repeated identities
    fn canonicalize(
        &self,
        records: Vec<ObjectRecord>,
        graph: &mut RelationshipGraph,
    ) -> Vec<ObjectRecord> {
        // Raw attributes break ties between duplicates so the survivor never
        // depends on input order
        let mut keyed: Vec<(String, ObjectRecord)> = records
            .into_iter()
            .map(|record| (serde_json::to_string(&record.raw).unwrap_or_default(), record))
            .collect();
        keyed.sort_by(|(a_raw, a), (b_raw, b)| {
            (a.object_type, &a.id, &a.name, a.created_at, a_raw)
                .cmp(&(b.object_type, &b.id, &b.name, b.created_at, b_raw))
        });

        let mut unique: Vec<ObjectRecord> = Vec::with_capacity(keyed.len());
        for (_, record) in keyed {
            if let Some(previous) = unique.last() {
                if previous.object_type == record.object_type && previous.id == record.id {
                    debug!("Duplicate record {} ignored", record.key());
                    graph.push_warning(BuildWarning::DuplicateRecord {
                        key: record.key(),
                        name: record.name,
                    });
                    continue;
                }
            }
            unique.push(record);
        }

        unique
    }

    fn extract(&self, record: &ObjectRecord) -> Extracted {
        match self.rules.extractor_for(record.object_type) {
            Some(extractor) => extractor.extract(record),
            None => Ok(Vec::new()),
        }
    }
}

/// Keys a reference points at, in key order. Empty when unresolved.
fn resolve(graph: &RelationshipGraph, reference: &Reference) -> Vec<ObjectKey> {
    match &reference.selector {
        Selector::Id(id) => {
            let key = ObjectKey::new(reference.target_type, id.clone());
            if graph.contains(&key) {
                vec![key]
            } else {
                Vec::new()
            }
        }
        Selector::Name(name) => graph
            .find_by_name(reference.target_type, name)
            .into_iter()
            .map(ObjectRecord::key)
            .collect(),
    }
}
