// Cycle detector - finds reference loops between objects
//
// Loops are legal in the source platform (group A is a member of group B,
// which is a member of group A) but they make a group's membership depend on
// itself and usually indicate a mistake. A loop is a strongly connected
// component with more than one member, or a single object referencing itself.

use petgraph::algo::tarjan_scc;
use serde::Serialize;
use tracing::debug;

use crate::graph::{ObjectKey, RelationshipGraph};

/// One strongly connected set of objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceCycle {
    /// Keys of the objects in the cycle, ordered
    pub members: Vec<ObjectKey>,

    /// Human-readable names, in member order
    pub names: Vec<String>,

    pub size: usize,
}

impl ReferenceCycle {
    pub fn is_self_reference(&self) -> bool {
        self.size == 1
    }
}

/// Detector for reference cycles
pub struct CycleDetector;

impl CycleDetector {
    pub fn new() -> Self {
        Self
    }

    /// Find every cycle in the graph.
    ///
    /// Returns cycles sorted by size (largest first), ties broken by the
    /// first member key.
    pub fn find_cycles(&self, graph: &RelationshipGraph) -> Vec<ReferenceCycle> {
        let inner = graph.inner();
        let sccs = tarjan_scc(inner);

        let mut cycles = Vec::new();

        for scc in sccs {
            // A single node is only a cycle when it points at itself
            if scc.len() == 1 && inner.find_edge(scc[0], scc[0]).is_none() {
                continue;
            }

            let mut members: Vec<ObjectKey> = scc
                .iter()
                .filter_map(|&idx| inner.node_weight(idx).cloned())
                .collect();
            members.sort();

            let names = members
                .iter()
                .map(|key| graph.get(key).map(|r| r.name.clone()).unwrap_or_default())
                .collect();

            debug!("Found cycle with {} members: {:?}", members.len(), members);

            cycles.push(ReferenceCycle {
                size: members.len(),
                members,
                names,
            });
        }

        cycles.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| a.members.first().cmp(&b.members.first()))
        });

        cycles
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}
