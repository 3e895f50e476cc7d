// Analyses over a built relationship graph
//
// Every analysis borrows the graph immutably, so independent queries can run
// concurrently against the same snapshot.

mod cycles;
mod impact;
mod orphans;

pub use cycles::{CycleDetector, ReferenceCycle};
pub use impact::{
    AffectedObject, AffectedRow, ImpactAnalyzer, ImpactPayload, ImpactReport, RiskLevel,
    RiskThresholds, TargetRow,
};
pub use orphans::{
    qualifying_incoming, Admission, OrphanCandidate, OrphanDetector, OrphanRelevance, OrphanRow,
    ScanOptions,
};
