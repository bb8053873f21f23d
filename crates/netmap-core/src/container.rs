//! Object containers
//!
//! One registry per entity type. Each container owns its instances,
//! enforces one-instance-per-identity by merging on insert, and iterates
//! in insertion order so serialization and tests are deterministic.
//! `get_or_create` is the sole creation path.
//!
//! Containers are not thread-safe; they are only touched from the single
//! scheduling task.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::ident::Subnet;
use crate::model::{Domain, Ipv4Address, Node, NodeKind};

/// Container for the domains in a network, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct DomainSet {
    entries: HashMap<String, Domain>,
    order: Vec<String>,
}

impl DomainSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the domain with a normalized name.
    pub fn get_or_create(&mut self, name: &str, zone: &str) -> &mut Domain {
        if !self.entries.contains_key(name) {
            self.order.push(name.to_string());
            self.entries
                .insert(name.to_string(), Domain::new(name, zone));
        }
        self.entries.get_mut(name).expect("domain just ensured")
    }

    /// Insert a domain, merging when the name already exists.
    ///
    /// Returns `true` when a merge happened.
    pub fn insert(&mut self, domain: Domain) -> bool {
        match self.entries.get_mut(domain.name()) {
            Some(existing) => {
                existing.merge(domain);
                true
            }
            None => {
                self.order.push(domain.name().to_string());
                self.entries.insert(domain.name().to_string(), domain);
                false
            }
        }
    }

    /// Whether a name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Shared access by name.
    pub fn get(&self, name: &str) -> Option<&Domain> {
        self.entries.get(name)
    }

    /// Mutable access by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Domain> {
        self.entries.get_mut(name)
    }

    /// Iterate domains in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Mutable iteration, in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Domain> {
        self.entries.values_mut()
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of domains.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Container for the IPv4 addresses in a network.
///
/// Also tracks the /24 subnets of the private addresses it holds, for the
/// subnet-fill pass.
#[derive(Debug, Clone, Default)]
pub struct Ipv4Set {
    entries: HashMap<Ipv4Addr, Ipv4Address>,
    order: Vec<Ipv4Addr>,
    private_subnets: BTreeSet<Subnet>,
}

impl Ipv4Set {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the entity for an address, constructing it via
    /// `make` on first reference.
    pub fn get_or_create(
        &mut self,
        addr: Ipv4Addr,
        make: impl FnOnce() -> Ipv4Address,
    ) -> &mut Ipv4Address {
        if !self.entries.contains_key(&addr) {
            let entity = make();
            debug_assert_eq!(entity.addr(), addr, "factory produced a different address");
            if entity.is_private {
                self.private_subnets.insert(Subnet::enclosing_24(addr));
            }
            self.order.push(addr);
            self.entries.insert(addr, entity);
        }
        self.entries.get_mut(&addr).expect("address just ensured")
    }

    /// Insert an entity, merging when the address already exists.
    ///
    /// Returns the NAT counterpart dropped by the merge, if any.
    pub fn insert(&mut self, entity: Ipv4Address) -> Option<Ipv4Addr> {
        match self.entries.get_mut(&entity.addr()) {
            Some(existing) => existing.merge(entity),
            None => {
                if entity.is_private {
                    self.private_subnets
                        .insert(Subnet::enclosing_24(entity.addr()));
                }
                self.order.push(entity.addr());
                self.entries.insert(entity.addr(), entity);
                None
            }
        }
    }

    /// Whether an address is present.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.entries.contains_key(&addr)
    }

    /// Shared access by address.
    pub fn get(&self, addr: Ipv4Addr) -> Option<&Ipv4Address> {
        self.entries.get(&addr)
    }

    /// Mutable access by address.
    pub fn get_mut(&mut self, addr: Ipv4Addr) -> Option<&mut Ipv4Address> {
        self.entries.get_mut(&addr)
    }

    /// Iterate entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Ipv4Address> {
        self.order.iter().filter_map(|addr| self.entries.get(addr))
    }

    /// Mutable iteration, in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Ipv4Address> {
        self.entries.values_mut()
    }

    /// Addresses in insertion order.
    pub fn addrs(&self) -> Vec<Ipv4Addr> {
        self.order.clone()
    }

    /// The /24 subnets containing at least one private address.
    pub fn private_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.private_subnets.iter()
    }

    /// Number of addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Container for the nodes in a network, keyed by identity.
///
/// Besides the live entries it keeps an alias map from superseded
/// identities to their successors, so stale references keep resolving
/// after a placeholder has been consumed.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    entries: HashMap<String, Node>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
}

impl NodeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an identity through the alias map to its canonical form.
    ///
    /// Alias chains are followed with a visited set; a cycle means the
    /// supersession invariant was violated and is surfaced as a
    /// resolution error.
    pub fn canonical(&self, identity: &str) -> Result<String> {
        let mut current = identity.to_ascii_lowercase();
        let mut visited = BTreeSet::new();
        while let Some(next) = self.aliases.get(&current) {
            if !visited.insert(current.clone()) {
                return Err(Error::resolution(format!(
                    "alias cycle while resolving node identity '{identity}'"
                )));
            }
            current = next.clone();
        }
        Ok(current)
    }

    /// Whether an identity (directly or through aliases) is present.
    pub fn contains(&self, identity: &str) -> bool {
        self.canonical(identity)
            .map(|id| self.entries.contains_key(&id))
            .unwrap_or(false)
    }

    /// Shared access by identity, following aliases.
    pub fn get(&self, identity: &str) -> Option<&Node> {
        self.canonical(identity)
            .ok()
            .and_then(|id| self.entries.get(&id))
    }

    /// Mutable access by identity, following aliases.
    pub fn get_mut(&mut self, identity: &str) -> Option<&mut Node> {
        let id = self.canonical(identity).ok()?;
        self.entries.get_mut(&id)
    }

    /// Look up or create a node, constructing via `make` on first
    /// reference. The factory's identity must canonicalize to `identity`.
    pub fn get_or_create(
        &mut self,
        identity: &str,
        make: impl FnOnce() -> Node,
    ) -> Result<&mut Node> {
        let id = self.canonical(identity)?;
        if !self.entries.contains_key(&id) {
            let node = make();
            debug_assert_eq!(node.identity(), id, "factory produced a different identity");
            self.order.push(id.clone());
            self.entries.insert(id.clone(), node);
        }
        Ok(self.entries.get_mut(&id).expect("node just ensured"))
    }

    /// Insert a node, merging when its canonical identity already exists.
    ///
    /// Returns the canonical identity and, when a merge discarded an
    /// incompatible kind, the conflict detail.
    pub fn insert(&mut self, node: Node) -> Result<(String, Option<String>)> {
        let id = self.canonical(node.identity())?;
        match self.entries.get_mut(&id) {
            Some(existing) => {
                let conflict = existing.merge(node);
                Ok((id, conflict))
            }
            None => {
                // Re-key under the canonical identity in case the entering
                // node used a superseded one.
                let node = if node.identity() == id {
                    node
                } else {
                    node.rekeyed(&id)
                };
                self.order.push(id.clone());
                self.entries.insert(id.clone(), node);
                Ok((id, None))
            }
        }
    }

    /// Remove a node by exact identity, returning it.
    pub fn remove(&mut self, identity: &str) -> Option<Node> {
        let removed = self.entries.remove(identity);
        if removed.is_some() {
            self.order.retain(|id| id != identity);
        }
        removed
    }

    /// Record that `old` has been superseded by `new`.
    ///
    /// Existing aliases pointing at `old` are re-pointed at `new` so
    /// chains stay shallow; a node can never become its own successor.
    pub fn add_alias(&mut self, old: &str, new: &str) -> Result<()> {
        let old = old.to_ascii_lowercase();
        let new = new.to_ascii_lowercase();
        if old == new {
            return Err(Error::resolution(format!(
                "node '{old}' cannot supersede itself"
            )));
        }
        for successor in self.aliases.values_mut() {
            if *successor == old {
                *successor = new.clone();
            }
        }
        if self.canonical(&new)? == old {
            return Err(Error::resolution(format!(
                "aliasing '{old}' to '{new}' would create a cycle"
            )));
        }
        self.aliases.insert(old, new);
        Ok(())
    }

    /// The alias map: superseded identity to successor.
    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Restore an alias map (snapshot recovery).
    pub(crate) fn restore_aliases(&mut self, aliases: HashMap<String, String>) {
        self.aliases = aliases;
    }

    /// The effective address set a node answers on.
    ///
    /// A plain node contributes its own addresses. A proxied node
    /// inherits its proxy's resolved set, unioned with its own addresses
    /// when it declares any. Chains and shared proxies are walked with a
    /// visited set, so cyclic proxy graphs terminate.
    pub fn resolved_addrs(&self, identity: &str) -> BTreeSet<Ipv4Addr> {
        let mut out = BTreeSet::new();
        let mut visited = BTreeSet::new();
        self.collect_addrs(identity, &mut visited, &mut out);
        out
    }

    fn collect_addrs(
        &self,
        identity: &str,
        visited: &mut BTreeSet<String>,
        out: &mut BTreeSet<Ipv4Addr>,
    ) {
        let Ok(id) = self.canonical(identity) else {
            return;
        };
        if !visited.insert(id.clone()) {
            return;
        }
        let Some(node) = self.entries.get(&id) else {
            return;
        };
        if let NodeKind::Proxied { proxy } = &node.kind {
            self.collect_addrs(proxy, visited, out);
        }
        out.extend(node.addrs.iter().copied());
    }

    /// Canonical identities of every node whose resolved address set
    /// contains `addr`, in insertion order.
    pub fn claimants(&self, addr: Ipv4Addr) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.resolved_addrs(id).contains(&addr))
            .cloned()
            .collect()
    }

    /// Build a map from claimed address to claiming identities.
    pub fn claim_index(&self) -> HashMap<Ipv4Addr, BTreeSet<String>> {
        let mut index: HashMap<Ipv4Addr, BTreeSet<String>> = HashMap::new();
        for id in &self.order {
            for addr in self.resolved_addrs(id) {
                index.entry(addr).or_default().insert(id.clone());
            }
        }
        index
    }

    /// Iterate nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Mutable iteration, in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.entries.values_mut()
    }

    /// Canonical identities in insertion order.
    pub fn identities(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of live nodes (aliases excluded).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
