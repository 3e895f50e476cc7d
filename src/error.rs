//! Error and warning taxonomy for graph construction and queries.
//!
//! Build-time problems with individual records never abort a build; they are
//! collected as [`BuildWarning`]s on the graph. Configuration problems and
//! lookups of missing objects are hard errors scoped to the call that hit them.

use serde::Serialize;
use thiserror::Error;

use crate::graph::{ObjectKey, ObjectType, ReferenceKind};

/// Malformed extraction rules, name patterns or risk thresholds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid field path '{path}' in {object_type} rule: {reason}")]
    InvalidFieldPath {
        object_type: ObjectType,
        path: String,
        reason: String,
    },

    #[error("invalid name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid risk thresholds: low_max ({low_max}) exceeds medium_max ({medium_max})")]
    InvalidThresholds { low_max: usize, medium_max: usize },
}

/// A single record whose references could not be extracted.
///
/// The record stays in the graph as a node but contributes no edges.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{key} ('{name}'): field '{field}': {reason}")]
pub struct PartialRecordError {
    pub key: ObjectKey,
    pub name: String,
    pub field: String,
    pub reason: String,
}

/// Non-fatal findings collected while building a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum BuildWarning {
    PartialRecord(PartialRecordError),

    /// The target of a reference is not part of the snapshot
    UnresolvedReference {
        source: ObjectKey,
        target: ObjectKey,
        kind: ReferenceKind,
    },

    /// A second record with an identity already present; the first one wins
    DuplicateRecord { key: ObjectKey, name: String },
}

impl BuildWarning {
    pub fn code(&self) -> &'static str {
        match self {
            BuildWarning::PartialRecord(_) => "partial-record",
            BuildWarning::UnresolvedReference { .. } => "unresolved-reference",
            BuildWarning::DuplicateRecord { .. } => "duplicate-record",
        }
    }
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildWarning::PartialRecord(err) => write!(f, "{}", err),
            BuildWarning::UnresolvedReference {
                source,
                target,
                kind,
            } => write!(f, "{} {} {} which is not in the snapshot", source, kind, target),
            BuildWarning::DuplicateRecord { key, name } => {
                write!(f, "duplicate record {} ('{}') ignored", key, name)
            }
        }
    }
}

/// Errors returned by graph queries and analyses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("object {0} not found in the graph")]
    NotFound(ObjectKey),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
