use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{ObjectKey, ObjectType};

/// Kind of reference between two objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    /// Policy runs a script
    RunsScript,

    /// Policy installs a package
    InstallsPackage,

    /// Policy or profile is scoped to a group
    ScopedToGroup,

    /// Policy or profile excludes a group from its scope
    ExcludesGroup,

    /// Smart group or search criterion on membership of another group
    MemberOfGroup,

    /// Criterion evaluated against an extension attribute
    UsesExtensionAttribute,

    /// Advanced search shows an extension attribute as a column
    DisplaysExtensionAttribute,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 7] = [
        ReferenceKind::RunsScript,
        ReferenceKind::InstallsPackage,
        ReferenceKind::ScopedToGroup,
        ReferenceKind::ExcludesGroup,
        ReferenceKind::MemberOfGroup,
        ReferenceKind::UsesExtensionAttribute,
        ReferenceKind::DisplaysExtensionAttribute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::RunsScript => "runs-script",
            ReferenceKind::InstallsPackage => "installs-package",
            ReferenceKind::ScopedToGroup => "scoped-to-group",
            ReferenceKind::ExcludesGroup => "excludes-group",
            ReferenceKind::MemberOfGroup => "member-of-group",
            ReferenceKind::UsesExtensionAttribute => "uses-extension-attribute",
            ReferenceKind::DisplaysExtensionAttribute => "displays-extension-attribute",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown reference kind '{}'", s))
    }
}

/// How an extracted reference names its target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Id(String),
    Name(String),
}

impl Selector {
    pub fn value(&self) -> &str {
        match self {
            Selector::Id(v) | Selector::Name(v) => v,
        }
    }
}

/// A reference found in one record, before it is resolved against the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub target_type: ObjectType,
    pub selector: Selector,
    pub kind: ReferenceKind,

    /// Keep the edge (flagged unresolved) when no target matches
    pub keep_unresolved: bool,
}

impl Reference {
    pub fn new(target_type: ObjectType, selector: Selector, kind: ReferenceKind) -> Self {
        Self {
            target_type,
            selector,
            kind,
            keep_unresolved: true,
        }
    }

    pub fn by_id(target_type: ObjectType, id: impl Into<String>, kind: ReferenceKind) -> Self {
        Self::new(target_type, Selector::Id(id.into()), kind)
    }

    pub fn by_name(target_type: ObjectType, name: impl Into<String>, kind: ReferenceKind) -> Self {
        Self::new(target_type, Selector::Name(name.into()), kind)
    }

    pub fn with_keep_unresolved(mut self, keep: bool) -> Self {
        self.keep_unresolved = keep;
        self
    }
}

/// A directed "uses" edge between two objects.
///
/// `unresolved` edges point at a target that is not part of the snapshot. For
/// a name reference that could not be resolved the target id is the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub source: ObjectKey,
    pub target: ObjectKey,
    pub kind: ReferenceKind,
    #[serde(default)]
    pub unresolved: bool,
}

impl ReferenceEdge {
    pub fn new(source: ObjectKey, target: ObjectKey, kind: ReferenceKind) -> Self {
        Self {
            source,
            target,
            kind,
            unresolved: false,
        }
    }

    pub fn unresolved(mut self) -> Self {
        self.unresolved = true;
        self
    }

    pub fn is_self_reference(&self) -> bool {
        self.source == self.target
    }
}

impl std::fmt::Display for ReferenceEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target)?;
        if self.unresolved {
            write!(f, " (unresolved)")?;
        }
        Ok(())
    }
}
