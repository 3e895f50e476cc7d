use miette::{miette, IntoDiagnostic, Result, WrapErr};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{Ingested, RecordSource};
use crate::graph::ObjectType;

/// A JSON export holding one array per collection:
///
/// ```json
/// {
///   "policies": [{"general": {"id": 1, "name": "Install Chrome"}, ...}],
///   "scripts": [{"id": 3, "name": "cleanup.sh"}]
/// }
/// ```
///
/// Collections are named after [`ObjectType::collection`]. Unknown
/// collections are skipped with a warning.
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a snapshot document held in memory
    pub fn parse(contents: &str) -> Result<Ingested> {
        let document: Value = serde_json::from_str(contents)
            .into_diagnostic()
            .wrap_err("Snapshot is not valid JSON")?;

        let Value::Object(collections) = document else {
            return Err(miette!("Snapshot must be a JSON object keyed by collection name"));
        };

        let mut ingested = Ingested::new();

        for (collection, items) in &collections {
            let Some(object_type) = ObjectType::from_collection(collection) else {
                warn!("Ignoring unknown collection '{}'", collection);
                continue;
            };

            let Value::Array(items) = items else {
                warn!("Ignoring collection '{}': expected an array", collection);
                continue;
            };

            for item in items {
                ingested.push(object_type, item);
            }
        }

        Ok(ingested)
    }
}

impl RecordSource for JsonSnapshot {
    fn load(&self) -> Result<Ingested> {
        let contents = std::fs::read_to_string(&self.path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read snapshot: {}", self.path.display()))?;

        let ingested = Self::parse(&contents)
            .wrap_err_with(|| format!("Failed to load snapshot: {}", self.path.display()))?;

        info!(
            "Loaded {} records from {} ({} rejected)",
            ingested.records.len(),
            self.path.display(),
            ingested.rejected.len()
        );

        Ok(ingested)
    }
}
