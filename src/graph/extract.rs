//! Reference extraction rules.
//!
//! Each object type maps to one [`Extractor`] in an [`ExtractionRuleSet`].
//! The stock extractor is [`FieldExtractor`], driven by declarative
//! [`FieldRule`]s: a field path into the record's raw attributes, the type of
//! object the values point at, and the kind of link they represent.
//!
//! Field paths are dot separated. A segment ending in `[]` walks every element
//! of an array; `[field=value]` walks only the elements whose `field` equals
//! `value`:
//!
//! ```text
//! scripts[].id
//! scope.exclusions.computer_groups[].id
//! criteria[name=Computer Group].value
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ObjectRecord, ObjectType, Reference, ReferenceKind, Selector};
use crate::error::{ConfigurationError, PartialRecordError};

/// Turns one record into the references it holds
pub trait Extractor: Send + Sync {
    fn extract(&self, record: &ObjectRecord) -> Result<Vec<Reference>, PartialRecordError>;
}

impl<F> Extractor for F
where
    F: Fn(&ObjectRecord) -> Result<Vec<Reference>, PartialRecordError> + Send + Sync,
{
    fn extract(&self, record: &ObjectRecord) -> Result<Vec<Reference>, PartialRecordError> {
        self(record)
    }
}

/// Whether a field holds target ids or target names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOn {
    #[default]
    Id,
    Name,
}

fn default_true() -> bool {
    true
}

/// Declarative mapping from a raw field to references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub path: String,

    pub target: ObjectType,

    pub kind: ReferenceKind,

    #[serde(default)]
    pub match_on: MatchOn,

    /// Record references that match no object as unresolved edges.
    /// Turn off for fields that may also name things outside the snapshot,
    /// such as built-in inventory criteria.
    #[serde(default = "default_true")]
    pub keep_unresolved: bool,
}

impl FieldRule {
    pub fn new(path: impl Into<String>, target: ObjectType, kind: ReferenceKind) -> Self {
        Self {
            path: path.into(),
            target,
            kind,
            match_on: MatchOn::Id,
            keep_unresolved: true,
        }
    }

    pub fn by_name(mut self) -> Self {
        self.match_on = MatchOn::Name;
        self
    }

    pub fn lenient(mut self) -> Self {
        self.keep_unresolved = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Access {
    Field,
    Each,
    Filter { field: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    key: String,
    access: Access,
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, String> {
        if path.trim().is_empty() {
            return Err("path is empty".to_string());
        }

        let mut segments = Vec::new();
        for part in split_segments(path)? {
            segments.push(parse_segment(&part)?);
        }

        Ok(Self { segments })
    }

    /// Collect every value the path reaches in `raw`.
    ///
    /// Missing fields and nulls reach nothing; a value of the wrong shape on
    /// the way down is an error.
    pub fn resolve<'a>(&self, raw: &'a Map<String, Value>) -> Result<Vec<&'a Value>, String> {
        let mut out = Vec::new();
        descend(raw, &self.segments, &mut out)?;
        Ok(out)
    }
}

/// Split on dots that are not inside a `[...]` filter
fn split_segments(path: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for ch in path.chars() {
        match ch {
            '[' if in_brackets => return Err("nested '[' is not allowed".to_string()),
            '[' => {
                in_brackets = true;
                current.push(ch);
            }
            ']' if !in_brackets => return Err("unbalanced ']'".to_string()),
            ']' => {
                in_brackets = false;
                current.push(ch);
            }
            '.' if !in_brackets => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    if in_brackets {
        return Err("unclosed '['".to_string());
    }
    parts.push(current);

    Ok(parts)
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    let (key, access) = match part.find('[') {
        None => (part, Access::Field),
        Some(open) => {
            if !part.ends_with(']') {
                return Err(format!("text after ']' in segment '{}'", part));
            }
            let inner = &part[open + 1..part.len() - 1];
            let access = if inner.is_empty() {
                Access::Each
            } else {
                let (field, value) = inner
                    .split_once('=')
                    .ok_or_else(|| format!("filter '[{}]' must be field=value", inner))?;
                let field = field.trim();
                if field.is_empty() {
                    return Err(format!("filter '[{}]' has no field", inner));
                }
                Access::Filter {
                    field: field.to_string(),
                    value: value.trim().to_string(),
                }
            };
            (&part[..open], access)
        }
    };

    let key = key.trim();
    if key.is_empty() {
        return Err("empty segment".to_string());
    }

    Ok(Segment {
        key: key.to_string(),
        access,
    })
}

fn descend<'a>(
    obj: &'a Map<String, Value>,
    segments: &[Segment],
    out: &mut Vec<&'a Value>,
) -> Result<(), String> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(());
    };

    let child = match obj.get(&segment.key) {
        None | Some(Value::Null) => return Ok(()),
        Some(child) => child,
    };

    match &segment.access {
        Access::Field => visit(child, &segment.key, rest, out),
        Access::Each | Access::Filter { .. } => {
            let Value::Array(items) = child else {
                return Err(format!("expected an array at '{}'", segment.key));
            };
            for item in items {
                if let Access::Filter { field, value } = &segment.access {
                    if !field_equals(item, field, value) {
                        continue;
                    }
                }
                visit(item, &segment.key, rest, out)?;
            }
            Ok(())
        }
    }
}

fn visit<'a>(
    value: &'a Value,
    key: &str,
    rest: &[Segment],
    out: &mut Vec<&'a Value>,
) -> Result<(), String> {
    if rest.is_empty() {
        if !value.is_null() {
            out.push(value);
        }
        return Ok(());
    }

    match value {
        Value::Null => Ok(()),
        Value::Object(map) => descend(map, rest, out),
        _ => Err(format!("expected an object at '{}'", key)),
    }
}

fn field_equals(item: &Value, field: &str, expected: &str) -> bool {
    match item.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        _ => false,
    }
}

/// Interpret a leaf value as a target id
fn leaf_id(value: &Value) -> Result<String, String> {
    match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::String(_) => Err("empty id".to_string()),
        other => Err(format!("expected an id, found {}", describe(other))),
    }
}

/// Interpret a leaf value as a target name. Empty names mean "not set".
fn leaf_name(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => Err(format!("expected a name, found {}", describe(other))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a non-integer number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    path: FieldPath,
    rule: FieldRule,
}

/// Extractor driven by a list of [`FieldRule`]s
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<CompiledRule>,
}

impl FieldExtractor {
    pub fn new(object_type: ObjectType, rules: &[FieldRule]) -> Result<Self, ConfigurationError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let path = FieldPath::parse(&rule.path).map_err(|reason| {
                    ConfigurationError::InvalidFieldPath {
                        object_type,
                        path: rule.path.clone(),
                        reason,
                    }
                })?;
                Ok(CompiledRule {
                    path,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        Ok(Self { rules })
    }
}

impl Extractor for FieldExtractor {
    fn extract(&self, record: &ObjectRecord) -> Result<Vec<Reference>, PartialRecordError> {
        let mut references = Vec::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let malformed = |reason: String| PartialRecordError {
                key: record.key(),
                name: record.name.clone(),
                field: rule.path.clone(),
                reason,
            };

            for value in compiled.path.resolve(&record.raw).map_err(&malformed)? {
                let selector = match rule.match_on {
                    MatchOn::Id => Selector::Id(leaf_id(value).map_err(&malformed)?),
                    MatchOn::Name => match leaf_name(value).map_err(&malformed)? {
                        Some(name) => Selector::Name(name),
                        None => continue,
                    },
                };

                references.push(
                    Reference::new(rule.target, selector, rule.kind)
                        .with_keep_unresolved(rule.keep_unresolved),
                );
            }
        }

        Ok(references)
    }
}

/// Declarative rules keyed by the type of the record they apply to
pub type RuleConfig = BTreeMap<ObjectType, Vec<FieldRule>>;

/// Registry of extractors, one per object type.
///
/// Types without an entry contribute nodes but no edges.
#[derive(Clone, Default)]
pub struct ExtractionRuleSet {
    extractors: BTreeMap<ObjectType, Arc<dyn Extractor>>,
}

impl ExtractionRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile declarative rules into [`FieldExtractor`]s
    pub fn from_rules(rules: &RuleConfig) -> Result<Self, ConfigurationError> {
        let mut set = Self::new();
        for (object_type, type_rules) in rules {
            let extractor = FieldExtractor::new(*object_type, type_rules)?;
            set.register(*object_type, extractor);
        }
        Ok(set)
    }

    /// Register (or replace) the extractor for a type
    pub fn register(&mut self, object_type: ObjectType, extractor: impl Extractor + 'static) {
        self.extractors.insert(object_type, Arc::new(extractor));
    }

    pub fn extractor_for(&self, object_type: ObjectType) -> Option<&dyn Extractor> {
        self.extractors.get(&object_type).map(|e| e.as_ref())
    }

    pub fn types(&self) -> impl Iterator<Item = ObjectType> + '_ {
        self.extractors.keys().copied()
    }
}

impl std::fmt::Debug for ExtractionRuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRuleSet")
            .field("types", &self.types().collect::<Vec<_>>())
            .finish()
    }
}
