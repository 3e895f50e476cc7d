//! refscope - Relationship and impact analysis for device-management objects
//!
//! This library builds a reference graph over exported configuration objects
//! (policies, scripts, packages, profiles, smart groups, extension attributes
//! and advanced searches) and answers questions about it: what does nothing
//! use, and what breaks if something is deleted.
//!
//! # Architecture
//!
//! The analysis pipeline consists of:
//! 1. **Ingestion** - Normalize exported objects into records
//! 2. **Graph Building** - Extract references with per-type rules and build
//!    a directed graph, once per snapshot
//! 3. **Orphan Detection** - Find objects nothing references
//! 4. **Impact Analysis** - Walk reverse edges to size a deletion
//! 5. **Cycle Detection** - Find objects that reference themselves
//! 6. **Reporting** - Output results as colored text or JSON

pub mod analysis;
pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod report;

pub use analysis::{
    CycleDetector, ImpactAnalyzer, ImpactReport, OrphanCandidate, OrphanDetector, RiskLevel,
    RiskThresholds, ScanOptions,
};
pub use config::Config;
pub use error::{AnalysisError, BuildWarning, ConfigurationError, PartialRecordError};
pub use graph::{
    build, ExtractionRuleSet, GraphBuilder, ObjectKey, ObjectRecord, ObjectType, ReferenceEdge,
    ReferenceKind, RelationshipGraph,
};
pub use ingest::{normalize, Ingested, JsonSnapshot, RecordSource};
pub use report::{ReportFormat, Reporter};
