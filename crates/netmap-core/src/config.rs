//! Configuration types for the netmap core
//!
//! The core consumes configuration, it never produces it: excluded domain
//! names, ordered label definitions, named subnets with locations,
//! organizations, and scheduler tuning.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident::{self, Subnet};

/// Network-model configuration.
///
/// Label declaration order is significant: when an object carries several
/// labels with conflicting attribute values, the label declared earliest
/// wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Domain names to refuse at creation, silently.
    #[serde(default)]
    pub exclusions: BTreeSet<String>,

    /// Label definitions, in declaration order.
    #[serde(default)]
    pub labels: Vec<LabelConfig>,

    /// Named subnets used to derive a location for each address.
    #[serde(default)]
    pub subnets: Vec<SubnetConfig>,

    /// Organization reference documents.
    #[serde(default)]
    pub organizations: Vec<OrganizationConfig>,

    /// Additional ranges to classify as private, beyond RFC1918.
    #[serde(default)]
    pub private_ranges: Vec<Subnet>,
}

impl NetworkConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "failed to read config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Exclusions must be valid domain names, label names must be unique,
    /// and organizations may only reference declared labels.
    pub fn validate(&self) -> Result<()> {
        for name in &self.exclusions {
            ident::normalize_domain(name)?;
        }

        let mut seen = BTreeSet::new();
        for label in &self.labels {
            if label.name.is_empty() {
                return Err(Error::config("label with an empty name"));
            }
            if !seen.insert(label.name.as_str()) {
                return Err(Error::config(format!(
                    "label '{}' is declared more than once",
                    label.name
                )));
            }
        }

        for org in &self.organizations {
            if org.name.is_empty() {
                return Err(Error::config("organization with an empty name"));
            }
        }

        Ok(())
    }

    /// Whether a normalized domain name is excluded from the network.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.contains(name)
    }

    /// Organization inherited by an object bearing `labels`.
    ///
    /// Label definitions are consulted in declaration order (earliest
    /// declared wins), then the organization/label associations.
    pub fn organization_for(&self, labels: &BTreeSet<String>) -> Option<String> {
        for label in &self.labels {
            if labels.contains(&label.name)
                && let Some(org) = &label.organization
            {
                return Some(org.clone());
            }
        }
        self.organizations
            .iter()
            .find(|org| org.labels.iter().any(|l| labels.contains(l)))
            .map(|org| org.name.clone())
    }

    /// Role inherited by an object bearing `labels`, earliest-declared
    /// label wins.
    pub fn role_for(&self, labels: &BTreeSet<String>) -> Option<String> {
        self.labels
            .iter()
            .filter(|label| labels.contains(&label.name))
            .find_map(|label| label.role.clone())
    }

    /// Arbitrary attribute inherited by an object bearing `labels`,
    /// earliest-declared label wins.
    pub fn attr_for(&self, labels: &BTreeSet<String>, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .filter(|label| labels.contains(&label.name))
            .find_map(|label| label.attrs.get(key).map(String::as_str))
    }
}

/// A named subnet with the location it maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetConfig {
    /// The subnet in CIDR form.
    pub cidr: Subnet,
    /// Location name assigned to addresses inside the subnet.
    pub location: String,
}

impl SubnetConfig {
    /// Create a new subnet configuration.
    pub fn new(cidr: Subnet, location: impl Into<String>) -> Self {
        Self {
            cidr,
            location: location.into(),
        }
    }
}

/// A label definition: a tag name plus the attributes objects bearing the
/// tag inherit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// The tag name.
    pub name: String,

    /// Organization assigned to tagged objects.
    #[serde(default)]
    pub organization: Option<String>,

    /// Role assigned to tagged objects.
    #[serde(default)]
    pub role: Option<String>,

    /// Arbitrary key/value attributes.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl LabelConfig {
    /// Create a label definition with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            organization: None,
            role: None,
            attrs: BTreeMap::new(),
        }
    }

    /// Set the inherited organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set the inherited role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set an arbitrary attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

/// An organization reference document and the labels associated with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    /// Organization name.
    pub name: String,

    /// Labels whose bearers belong to this organization.
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

/// Scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of the refresh event channel.
    ///
    /// When full, further events are dropped with a warning rather than
    /// blocking the refresh.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Whether to generate entities for the unused addresses of private
    /// /24 subnets the network touches.
    #[serde(default = "default_fill_subnets")]
    pub fill_subnets: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            fill_subnets: default_fill_subnets(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_fill_subnets() -> bool {
    true
}
