//! Plugin contract and registry
//!
//! Plugins supply topology facts from heterogeneous sources and are the
//! only way data enters the network model. They are registered explicitly
//! at startup; the registry keeps declaration order, which is the stable
//! tie-break for scheduling.
//!
//! ## Registration
//!
//! ```rust,ignore
//! let mut registry = PluginRegistry::new();
//! registry.register(Arc::new(ZonefilePlugin::new(path)))?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::Network;

/// A named phase in the refresh lifecycle.
///
/// Stages fix plugin execution order at a coarse grain: DNS facts arrive
/// before NAT/link augmentation, which arrives before node production,
/// and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Pre-fetch initialisation.
    Init,
    /// DNS record ingestion.
    Dns,
    /// NAT and link augmentation.
    Nat,
    /// Node production.
    Nodes,
    /// Post-resolution annotation.
    Footers,
    /// Output writing.
    Write,
    /// Post-refresh cleanup.
    Cleanup,
}

impl LifecycleStage {
    /// All stages, in execution order.
    pub const ALL: [LifecycleStage; 7] = [
        LifecycleStage::Init,
        LifecycleStage::Dns,
        LifecycleStage::Nat,
        LifecycleStage::Nodes,
        LifecycleStage::Footers,
        LifecycleStage::Write,
        LifecycleStage::Cleanup,
    ];
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleStage::Init => "init",
            LifecycleStage::Dns => "dns",
            LifecycleStage::Nat => "nat",
            LifecycleStage::Nodes => "nodes",
            LifecycleStage::Footers => "footers",
            LifecycleStage::Write => "write",
            LifecycleStage::Cleanup => "cleanup",
        };
        f.write_str(s)
    }
}

/// Trait for plugin implementations.
///
/// A plugin declares which stages it handles and is invoked once per
/// declared stage with exclusive access to the shared [`Network`].
/// Handlers may perform their own I/O (and time it out themselves), but
/// all model mutation happens synchronously through the methods of the
/// passed network: the containers are not thread-safe and are only ever
/// touched from the scheduling task.
///
/// A handler that fails is isolated: the error is logged with plugin and
/// stage context and the remaining plugins and stages still run.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name. Used for dependency references, whitelisting
    /// and log context.
    fn name(&self) -> &str;

    /// The stages this plugin handles.
    fn stages(&self) -> Vec<LifecycleStage>;

    /// Names of other plugins that must run in the same refresh for this
    /// plugin to be usable. A plugin with an unmet dependency is skipped
    /// entirely.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Label attributes this plugin wants configurable per label.
    fn label_attrs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Custom node kind names this plugin introduces. Registered so a
    /// snapshot containing them can be recreated without loss.
    fn node_kinds(&self) -> Vec<String> {
        Vec::new()
    }

    /// File or directory names this plugin writes, for packaging.
    fn outputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time initialisation before the first stage runs.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Run the handler for one declared stage.
    async fn run(&self, stage: LifecycleStage, network: &mut Network) -> Result<()>;
}

/// Registry of plugins, in declaration order.
///
/// Declaration order is observable: plugins with no dependency
/// relationship execute in the order they were registered.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Duplicate names are a configuration error.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if name.is_empty() {
            return Err(Error::config("plugin with an empty name"));
        }
        if self.index.contains_key(&name) {
            return Err(Error::config(format!(
                "plugin '{name}' is registered more than once"
            )));
        }
        self.index.insert(name, self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Whether a plugin name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.index.get(name).map(|&i| &self.plugins[i])
    }

    /// Iterate plugins in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Registered plugin names, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Union of the label attributes requested by all plugins.
    pub fn label_attrs(&self) -> BTreeSet<String> {
        self.plugins
            .iter()
            .flat_map(|p| p.label_attrs())
            .collect()
    }

    /// Union of the custom node kinds introduced by all plugins.
    pub fn node_kinds(&self) -> BTreeSet<String> {
        self.plugins
            .iter()
            .flat_map(|p| p.node_kinds())
            .collect()
    }

    /// Union of the output names declared by all plugins.
    pub fn outputs(&self) -> BTreeSet<String> {
        self.plugins.iter().flat_map(|p| p.outputs()).collect()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// The set of plugins enabled by the user.
///
/// `["*"]` is the wildcard: every registered plugin is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginWhitelist(Vec<String>);

impl PluginWhitelist {
    /// The wildcard entry matching every plugin.
    pub const WILDCARD: &str = "*";

    /// A whitelist enabling every plugin.
    pub fn wildcard() -> Self {
        Self(vec![Self::WILDCARD.to_string()])
    }

    /// A whitelist enabling exactly the named plugins.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Whether this whitelist enables everything.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|n| n == Self::WILDCARD)
    }

    /// Whether a plugin name is enabled.
    pub fn contains(&self, name: &str) -> bool {
        self.is_wildcard() || self.0.iter().any(|n| n == name)
    }

    /// The explicitly named plugins (empty for a wildcard list).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|n| n.as_str() != Self::WILDCARD)
            .map(String::as_str)
    }
}

impl Default for PluginWhitelist {
    fn default() -> Self {
        Self::wildcard()
    }
}
