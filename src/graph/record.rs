use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Kind of configuration object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Policy,
    Script,
    Package,
    ConfigurationProfile,
    MobileDeviceProfile,
    ComputerGroup,
    MobileDeviceGroup,
    ExtensionAttribute,
    AdvancedSearch,
}

impl ObjectType {
    pub const ALL: [ObjectType; 9] = [
        ObjectType::Policy,
        ObjectType::Script,
        ObjectType::Package,
        ObjectType::ConfigurationProfile,
        ObjectType::MobileDeviceProfile,
        ObjectType::ComputerGroup,
        ObjectType::MobileDeviceGroup,
        ObjectType::ExtensionAttribute,
        ObjectType::AdvancedSearch,
    ];

    /// Stable identifier used in keys and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Policy => "policy",
            ObjectType::Script => "script",
            ObjectType::Package => "package",
            ObjectType::ConfigurationProfile => "configuration_profile",
            ObjectType::MobileDeviceProfile => "mobile_device_profile",
            ObjectType::ComputerGroup => "computer_group",
            ObjectType::MobileDeviceGroup => "mobile_device_group",
            ObjectType::ExtensionAttribute => "extension_attribute",
            ObjectType::AdvancedSearch => "advanced_search",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ObjectType::Policy => "policy",
            ObjectType::Script => "script",
            ObjectType::Package => "package",
            ObjectType::ConfigurationProfile => "configuration profile",
            ObjectType::MobileDeviceProfile => "mobile device profile",
            ObjectType::ComputerGroup => "computer group",
            ObjectType::MobileDeviceGroup => "mobile device group",
            ObjectType::ExtensionAttribute => "extension attribute",
            ObjectType::AdvancedSearch => "advanced search",
        }
    }

    /// Name of the collection holding this type in an exported snapshot
    pub fn collection(&self) -> &'static str {
        match self {
            ObjectType::Policy => "policies",
            ObjectType::Script => "scripts",
            ObjectType::Package => "packages",
            ObjectType::ConfigurationProfile => "configuration_profiles",
            ObjectType::MobileDeviceProfile => "mobile_device_profiles",
            ObjectType::ComputerGroup => "computer_groups",
            ObjectType::MobileDeviceGroup => "mobile_device_groups",
            ObjectType::ExtensionAttribute => "extension_attributes",
            ObjectType::AdvancedSearch => "advanced_searches",
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.collection() == name)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized || t.collection() == normalized)
            .ok_or_else(|| format!("unknown object type '{}'", s))
    }
}

/// Identity of an object: its type plus an id unique within that type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub id: String,
}

impl ObjectKey {
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        Self {
            object_type,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    /// Parse `type:id`, e.g. `policy:12` or `computer_group:7`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object_type, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected TYPE:ID, got '{}'", s))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(format!("missing id in '{}'", s));
        }
        Ok(Self::new(object_type.parse()?, id))
    }
}

/// One configuration object as supplied by the ingestion layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    pub id: String,

    pub name: String,

    /// Per-type attributes, inspected by extraction rules
    #[serde(default)]
    pub raw: Map<String, Value>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ObjectRecord {
    pub fn new(object_type: ObjectType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_type,
            id: id.into(),
            name: name.into(),
            raw: Map::new(),
            created_at: None,
        }
    }

    /// Replace the raw attributes. Non-object values are ignored.
    pub fn with_raw(mut self, raw: Value) -> Self {
        if let Value::Object(map) = raw {
            self.raw = map;
        }
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.object_type, self.id.clone())
    }

    /// Whole days between creation and `as_of`, clamped at zero.
    /// `None` when no creation time is known.
    pub fn age_in_days(&self, as_of: DateTime<Utc>) -> Option<i64> {
        self.created_at
            .map(|created| (as_of - created).num_days().max(0))
    }

    pub fn display(&self) -> String {
        format!("{} '{}' ({})", self.object_type.display_name(), self.name, self.key())
    }
}
