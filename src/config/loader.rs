use chrono::{DateTime, Utc};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::{OrphanRelevance, RiskThresholds, ScanOptions};
use crate::error::ConfigurationError;
use crate::graph::{ExtractionRuleSet, FieldRule, ObjectType, ReferenceKind, RuleConfig};

/// Configuration for a refscope analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference extraction rules by object type. A `rules` section in a
    /// config file replaces the built-in rules as a whole.
    pub rules: RuleConfig,

    /// Orphan detection settings
    pub orphans: OrphanConfig,

    /// Impact severity bands
    pub risk: RiskThresholds,

    /// Graph construction settings
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrphanConfig {
    /// Objects younger than this are never reported
    pub min_age_days: u32,

    /// Globs for names that are never reported (case-insensitive)
    pub exclude_name_patterns: Vec<String>,

    /// Reference kinds that do not keep an object alive
    pub ignored_kinds: Vec<ReferenceKind>,

    /// Whether an object referencing itself counts as used
    pub count_self_references: bool,

    /// Types nothing points at by nature; skipped unless asked for explicitly
    pub root_types: Vec<ObjectType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Extract references in parallel
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            orphans: OrphanConfig::default(),
            risk: RiskThresholds::default(),
            build: BuildConfig::default(),
        }
    }
}

impl Default for OrphanConfig {
    fn default() -> Self {
        Self {
            min_age_days: 30,
            exclude_name_patterns: vec![],
            ignored_kinds: vec![],
            count_self_references: false,
            root_types: vec![
                ObjectType::Policy,
                ObjectType::ConfigurationProfile,
                ObjectType::MobileDeviceProfile,
                ObjectType::AdvancedSearch,
            ],
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Built-in rules for the platform's classic export shapes
pub fn default_rules() -> RuleConfig {
    use ObjectType::*;
    use ReferenceKind::*;

    let mut rules = RuleConfig::new();

    rules.insert(
        Policy,
        vec![
            FieldRule::new("scripts[].id", Script, RunsScript),
            FieldRule::new("package_configuration.packages[].id", Package, InstallsPackage),
            FieldRule::new("scope.computer_groups[].id", ComputerGroup, ScopedToGroup),
            FieldRule::new("scope.exclusions.computer_groups[].id", ComputerGroup, ExcludesGroup),
        ],
    );

    rules.insert(
        ConfigurationProfile,
        vec![
            FieldRule::new("scope.computer_groups[].id", ComputerGroup, ScopedToGroup),
            FieldRule::new("scope.exclusions.computer_groups[].id", ComputerGroup, ExcludesGroup),
        ],
    );

    rules.insert(
        MobileDeviceProfile,
        vec![
            FieldRule::new("scope.mobile_device_groups[].id", MobileDeviceGroup, ScopedToGroup),
            FieldRule::new(
                "scope.exclusions.mobile_device_groups[].id",
                MobileDeviceGroup,
                ExcludesGroup,
            ),
        ],
    );

    rules.insert(
        ComputerGroup,
        vec![
            FieldRule::new("criteria[name=Computer Group].value", ComputerGroup, MemberOfGroup)
                .by_name(),
            FieldRule::new("criteria[].name", ExtensionAttribute, UsesExtensionAttribute)
                .by_name()
                .lenient(),
        ],
    );

    rules.insert(
        MobileDeviceGroup,
        vec![FieldRule::new(
            "criteria[name=Mobile Device Group].value",
            MobileDeviceGroup,
            MemberOfGroup,
        )
        .by_name()],
    );

    rules.insert(
        AdvancedSearch,
        vec![
            FieldRule::new("criteria[name=Computer Group].value", ComputerGroup, MemberOfGroup)
                .by_name(),
            FieldRule::new("criteria[].name", ExtensionAttribute, UsesExtensionAttribute)
                .by_name()
                .lenient(),
            FieldRule::new("display_fields[].name", ExtensionAttribute, DisplaysExtensionAttribute)
                .by_name()
                .lenient(),
        ],
    );

    rules
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations in `dir`
    pub fn from_default_locations(dir: &Path) -> Result<Self> {
        match Self::find_default(dir) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn find_default(dir: &Path) -> Option<PathBuf> {
        let default_names = [
            ".refscope.yml",
            ".refscope.yaml",
            ".refscope.toml",
            "refscope.yml",
            "refscope.yaml",
            "refscope.toml",
        ];

        default_names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Compile the extraction rules
    pub fn rule_set(&self) -> Result<ExtractionRuleSet, ConfigurationError> {
        ExtractionRuleSet::from_rules(&self.rules)
    }

    /// Orphan scan options with ages measured at `as_of`
    pub fn scan_options(&self, as_of: DateTime<Utc>) -> ScanOptions {
        ScanOptions {
            type_filter: vec![],
            min_age_days: self.orphans.min_age_days,
            exclude_name_patterns: self.orphans.exclude_name_patterns.clone(),
            relevance: OrphanRelevance {
                ignored_kinds: self.orphans.ignored_kinds.iter().copied().collect(),
                count_self_references: self.orphans.count_self_references,
            },
            root_types: self.orphans.root_types.clone(),
            as_of,
        }
    }
}
