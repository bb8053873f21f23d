//! The Node entity
//!
//! A node is the resolution target of DNS: a physical or virtual endpoint
//! you would actually connect to. Specialization is by composition: one
//! struct carries the common capability set (identity, addresses, links)
//! and a kind payload distinguishes placeholders, proxies, proxied
//! back-ends and plugin-supplied variants.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The variant payload of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Synthesized when a name resolved to addresses no explicit node
    /// claimed. Superseded by any non-placeholder node that later claims
    /// an overlapping address set.
    Placeholder,

    /// A generic node: just an identifying address set and a name.
    Default,

    /// A reverse-proxy / load-balancer endpoint.
    Proxy,

    /// A back-end resolved through a proxy. Its effective address set
    /// inherits from the proxy (see [`crate::container::NodeSet::resolved_addrs`]).
    Proxied {
        /// Identity of the proxy node in front of this one.
        proxy: String,
    },

    /// A plugin-supplied specialized variant (virtual machine, hardware,
    /// Kubernetes workload, ...). The kind name is registered by the
    /// contributing plugin so snapshots can be recreated; the details are
    /// opaque structured data.
    Custom {
        /// Registered kind name.
        kind: String,
        /// Plugin-defined detail document.
        details: serde_json::Value,
    },
}

impl NodeKind {
    /// Short kind name for logs and conflict reports.
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Placeholder => "placeholder",
            NodeKind::Default => "default",
            NodeKind::Proxy => "proxy",
            NodeKind::Proxied { .. } => "proxied",
            NodeKind::Custom { kind, .. } => kind,
        }
    }
}

/// A physical or virtual endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    identity: String,

    /// Display name.
    pub name: String,

    /// Variant payload.
    pub kind: NodeKind,

    /// Normalized domain names associated with this node.
    pub domains: BTreeSet<String>,

    /// Addresses this node claims to answer on.
    pub addrs: BTreeSet<Ipv4Addr>,

    /// Manual location override; when unset the containing-subnet
    /// location of the claimed addresses applies.
    pub location: Option<String>,

    /// Explicit organization association, if any.
    pub organization: Option<String>,

    /// Tags contributed by configuration or plugins.
    pub labels: BTreeSet<String>,

    /// Free-text notes fragment.
    pub notes: String,
}

impl Node {
    /// Create a node with a stable identity.
    ///
    /// The identity is lowercased; it is the key used for deduplication
    /// and cross-references.
    pub fn new(identity: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            identity: identity.into().to_ascii_lowercase(),
            name: name.into(),
            kind,
            domains: BTreeSet::new(),
            addrs: BTreeSet::new(),
            location: None,
            organization: None,
            labels: BTreeSet::new(),
            notes: String::new(),
        }
    }

    /// Synthesize a placeholder node for an unclaimed address set.
    ///
    /// The identity is the hex SHA-256 of the sorted address list, so the
    /// same unclaimed set always converges on the same placeholder across
    /// stages and refreshes.
    pub fn placeholder(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        let addrs: BTreeSet<Ipv4Addr> = addrs.into_iter().collect();
        let mut hasher = Sha256::new();
        for addr in &addrs {
            hasher.update(addr.to_string().as_bytes());
            hasher.update(b"\n");
        }
        let identity: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let name = format!("placeholder-{}", &identity[..8]);
        let mut node = Self::new(identity, name, NodeKind::Placeholder);
        node.addrs = addrs;
        node
    }

    /// The stable identity string.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Re-key this node under another identity. Used by the container
    /// when an entering node names a superseded identity.
    pub(crate) fn rekeyed(mut self, identity: &str) -> Self {
        self.identity = identity.to_ascii_lowercase();
        self
    }

    /// Whether this node is a supersedable placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, NodeKind::Placeholder)
    }

    /// Associate domain names (lowercased) with this node.
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains
            .extend(domains.into_iter().map(|d| d.into().to_ascii_lowercase()));
        self
    }

    /// Associate addresses with this node.
    pub fn with_addrs(mut self, addrs: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        self.addrs.extend(addrs);
        self
    }

    /// Set the manual location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Add labels.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Merge another node with the same identity into this one.
    ///
    /// Address, domain and label sets are unioned and single-value
    /// attributes fill only when unset. A placeholder always yields its
    /// kind (and synthesized name) to the other party, in either merge
    /// direction. Two differing non-placeholder kinds keep the incumbent
    /// and report the discarded kind as a conflict detail.
    pub fn merge(&mut self, other: Node) -> Option<String> {
        debug_assert_eq!(self.identity, other.identity, "merging different identities");

        let mut conflict = None;
        if self.is_placeholder() && !other.is_placeholder() {
            self.kind = other.kind.clone();
            self.name = other.name.clone();
        } else if !self.is_placeholder() && !other.is_placeholder() && self.kind != other.kind {
            conflict = Some(format!(
                "kept kind '{}', discarded kind '{}'",
                self.kind.name(),
                other.kind.name()
            ));
        }

        self.domains.extend(other.domains);
        self.addrs.extend(other.addrs);
        self.labels.extend(other.labels);
        if self.location.is_none() {
            self.location = other.location;
        }
        if self.organization.is_none() {
            self.organization = other.organization;
        }
        if self.notes.is_empty() {
            self.notes = other.notes;
        }
        conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: &str) -> Ipv4Addr {
        raw.parse().unwrap()
    }

    #[test]
    fn placeholder_identity_is_deterministic() {
        let a = Node::placeholder([addr("10.0.0.5"), addr("10.0.0.6")]);
        let b = Node::placeholder([addr("10.0.0.6"), addr("10.0.0.5")]);
        assert_eq!(a.identity(), b.identity());

        let c = Node::placeholder([addr("10.0.0.7")]);
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn identity_is_lowercased() {
        let node = Node::new("VM-Alpha", "alpha", NodeKind::Default);
        assert_eq!(node.identity(), "vm-alpha");
    }

    #[test]
    fn placeholder_yields_to_real_kind() {
        let mut placeholder = Node::placeholder([addr("10.0.0.5")]);
        let real = Node::new(placeholder.identity(), "web-1", NodeKind::Default)
            .with_addrs([addr("10.0.0.5"), addr("10.0.0.6")]);

        let conflict = placeholder.merge(real);
        assert!(conflict.is_none());
        assert_eq!(placeholder.kind, NodeKind::Default);
        assert_eq!(placeholder.name, "web-1");
        assert_eq!(placeholder.addrs.len(), 2);
    }

    #[test]
    fn differing_real_kinds_keep_the_incumbent() {
        let mut vm = Node::new("host-1", "host-1", NodeKind::Custom {
            kind: "virtual-machine".into(),
            details: serde_json::json!({"hypervisor": "xen"}),
        });
        let hw = Node::new("host-1", "host-1", NodeKind::Custom {
            kind: "hardware".into(),
            details: serde_json::Value::Null,
        });

        let conflict = vm.merge(hw);
        assert!(conflict.is_some());
        assert_eq!(vm.kind.name(), "virtual-machine");
    }
}
