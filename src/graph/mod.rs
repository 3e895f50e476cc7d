mod builder;
mod extract;
mod record;
pub mod reference;

pub use builder::GraphBuilder;
pub use extract::{
    ExtractionRuleSet, Extractor, FieldExtractor, FieldPath, FieldRule, MatchOn, RuleConfig,
};
pub use record::{ObjectKey, ObjectRecord, ObjectType};
pub use reference::{Reference, ReferenceEdge, ReferenceKind, Selector};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{BuildWarning, Result};

/// Build a graph from records using declarative rules.
///
/// Malformed rules fail the whole call; problems with individual records are
/// reported through [`RelationshipGraph::warnings`].
pub fn build(records: Vec<ObjectRecord>, rules: &RuleConfig) -> Result<RelationshipGraph> {
    let rule_set = ExtractionRuleSet::from_rules(rules)?;
    Ok(GraphBuilder::new(&rule_set).build(records))
}

/// The reference graph of one ingested snapshot.
///
/// Built once by [`GraphBuilder`] and read-only afterwards; every query takes
/// `&self`, so a graph can be shared between threads freely.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    /// Nodes are object keys, edges are resolved references
    inner: DiGraph<ObjectKey, ReferenceEdge>,

    /// Map from object key to node index
    node_map: HashMap<ObjectKey, NodeIndex>,

    /// Records by key, ordered
    records: BTreeMap<ObjectKey, ObjectRecord>,

    /// Map from (type, name) to the keys carrying that name
    name_index: HashMap<(ObjectType, String), Vec<ObjectKey>>,

    /// Edges whose target is not in the snapshot, by source
    unresolved: BTreeMap<ObjectKey, Vec<ReferenceEdge>>,

    warnings: Vec<BuildWarning>,
}

impl RelationshipGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a record as a node. Returns false if the key is already present.
    pub(crate) fn add_record(&mut self, record: ObjectRecord) -> bool {
        let key = record.key();
        if self.node_map.contains_key(&key) {
            return false;
        }

        let node_idx = self.inner.add_node(key.clone());
        self.node_map.insert(key.clone(), node_idx);

        self.name_index
            .entry((record.object_type, record.name.trim().to_string()))
            .or_default()
            .push(key.clone());

        self.records.insert(key, record);
        true
    }

    /// Add an edge. The source must be a node; an edge to an unknown target
    /// is kept as unresolved.
    pub(crate) fn add_edge(&mut self, edge: ReferenceEdge) {
        let Some(&from_idx) = self.node_map.get(&edge.source) else {
            return;
        };

        match self.node_map.get(&edge.target) {
            Some(&to_idx) if !edge.unresolved => {
                self.inner.add_edge(from_idx, to_idx, edge);
            }
            _ => {
                let edge = ReferenceEdge {
                    unresolved: true,
                    ..edge
                };
                self.unresolved
                    .entry(edge.source.clone())
                    .or_default()
                    .push(edge);
            }
        }
    }

    pub(crate) fn push_warning(&mut self, warning: BuildWarning) {
        self.warnings.push(warning);
    }

    /// Edges leaving `key`: what the object uses, resolved or not
    pub fn forward(&self, key: &ObjectKey) -> BTreeSet<&ReferenceEdge> {
        let Some(&node_idx) = self.node_map.get(key) else {
            return BTreeSet::new();
        };

        let mut edges: BTreeSet<&ReferenceEdge> = self
            .inner
            .edges_directed(node_idx, petgraph::Direction::Outgoing)
            .map(|edge| edge.weight())
            .collect();

        if let Some(dangling) = self.unresolved.get(key) {
            edges.extend(dangling.iter());
        }

        edges
    }

    /// Resolved edges arriving at `key`: what uses the object
    pub fn reverse(&self, key: &ObjectKey) -> BTreeSet<&ReferenceEdge> {
        let Some(&node_idx) = self.node_map.get(key) else {
            return BTreeSet::new();
        };

        self.inner
            .edges_directed(node_idx, petgraph::Direction::Incoming)
            .map(|edge| edge.weight())
            .collect()
    }

    /// Check if anything references the object
    pub fn is_referenced(&self, key: &ObjectKey) -> bool {
        let Some(&node_idx) = self.node_map.get(key) else {
            return false;
        };

        self.inner
            .edges_directed(node_idx, petgraph::Direction::Incoming)
            .next()
            .is_some()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&ObjectRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.node_map.contains_key(key)
    }

    /// The graph's own copy of `key`, borrowed for the graph's lifetime
    pub fn key_ref(&self, key: &ObjectKey) -> Option<&ObjectKey> {
        self.records.get_key_value(key).map(|(k, _)| k)
    }

    /// All records, ordered by key
    pub fn records(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.records.values()
    }

    pub fn records_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &ObjectRecord> {
        self.records
            .values()
            .filter(move |record| record.object_type == object_type)
    }

    /// Records of a type carrying this name, ignoring surrounding whitespace
    pub fn find_by_name(&self, object_type: ObjectType, name: &str) -> Vec<&ObjectRecord> {
        self.name_index
            .get(&(object_type, name.trim().to_string()))
            .map(|keys| keys.iter().filter_map(|key| self.records.get(key)).collect())
            .unwrap_or_default()
    }

    /// Every resolved edge, ordered
    pub fn edges(&self) -> BTreeSet<&ReferenceEdge> {
        self.inner.edge_weights().collect()
    }

    /// Every edge whose target is missing from the snapshot
    pub fn unresolved_edges(&self) -> impl Iterator<Item = &ReferenceEdge> {
        self.unresolved.values().flatten()
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn node_count(&self) -> usize {
        self.records.len()
    }

    /// Number of resolved edges
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.values().map(Vec::len).sum()
    }

    pub(crate) fn inner(&self) -> &DiGraph<ObjectKey, ReferenceEdge> {
        &self.inner
    }
}
