//! The Network root aggregate
//!
//! Owns the object containers, routes creation and lookup through them,
//! and implements the node-resolution pass that links DNS names to the
//! endpoints that answer on their addresses. Plugins only ever see this
//! type; the containers are reachable read-only.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::container::{DomainSet, Ipv4Set, NodeSet};
use crate::error::{Error, Result};
use crate::ident::{self, Subnet};
use crate::model::{DnsRecord, Domain, Ipv4Address, Node, NodeKind, RecordKind};
use crate::report::{Report, WarningKind};

/// Counters produced by one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Domains associated with at least one node.
    pub resolved: usize,
    /// Domains with no resolvable address and no node.
    pub unresolved: usize,
    /// Placeholder nodes synthesized.
    pub placeholders: usize,
    /// Domains associated with more than one node.
    pub multi_homed: usize,
}

/// The single consistent in-memory network model.
#[derive(Debug, Clone, Default)]
pub struct Network {
    config: NetworkConfig,
    domains: DomainSet,
    ips: Ipv4Set,
    nodes: NodeSet,
    report: Report,
}

impl Network {
    /// Create an empty network over a validated configuration.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            domains: DomainSet::new(),
            ips: Ipv4Set::new(),
            nodes: NodeSet::new(),
            report: Report::new(),
        })
    }

    /// Rebuild a network from its serialized parts (snapshot recovery).
    pub(crate) fn from_parts(
        config: NetworkConfig,
        domains: Vec<Domain>,
        ips: Vec<Ipv4Address>,
        nodes: Vec<Node>,
        aliases: HashMap<String, String>,
    ) -> Result<Self> {
        let mut network = Self::new(config)?;
        for domain in domains {
            network.domains.insert(domain);
        }
        for ip in ips {
            network.ips.insert(ip);
        }
        for node in nodes {
            network.nodes.insert(node)?;
        }
        network.nodes.restore_aliases(aliases);
        Ok(network)
    }

    /// The configuration this network was built with.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The accumulated refresh report.
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Mutable access to the refresh report (for plugins recording their
    /// own data-quality facts).
    pub fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    // ------------------------------------------------------------------
    // Creation / lookup

    /// Look up or create the domain for a raw name.
    ///
    /// Returns the canonical key, or `None` when the name is excluded by
    /// configuration: exclusion is silent, the object is never created.
    /// Malformed names are an `InvalidIdentity` error for the caller to
    /// skip and log.
    pub fn ensure_domain(&mut self, raw: &str) -> Result<Option<String>> {
        let name = ident::normalize_domain(raw)?;
        if self.config.is_excluded(&name) {
            debug!("refusing excluded domain '{name}'");
            return Ok(None);
        }
        let zone = ident::root_zone(&name);
        self.domains.get_or_create(&name, &zone);
        Ok(Some(name))
    }

    /// Like [`ensure_domain`](Self::ensure_domain) with an explicit zone,
    /// for callers that know which managed zone a name came from.
    pub fn ensure_domain_in_zone(&mut self, raw: &str, zone: &str) -> Result<Option<String>> {
        let name = ident::normalize_domain(raw)?;
        if self.config.is_excluded(&name) {
            debug!("refusing excluded domain '{name}'");
            return Ok(None);
        }
        let zone = ident::normalize_domain(zone)?;
        self.domains.get_or_create(&name, &zone);
        Ok(Some(name))
    }

    /// Look up or create the entity for an address, deriving its
    /// classification and location from configuration.
    pub fn ensure_ip(&mut self, addr: Ipv4Addr) -> Ipv4Addr {
        let is_private = ident::is_private(addr, &self.config.private_ranges);
        let location =
            ident::smallest_containing(addr, &self.config.subnets).map(|s| s.location.clone());
        self.ips
            .get_or_create(addr, || Ipv4Address::new(addr, is_private, location));
        addr
    }

    /// [`ensure_ip`](Self::ensure_ip) from a raw dotted-quad string.
    pub fn ensure_ip_str(&mut self, raw: &str) -> Result<Ipv4Addr> {
        let addr = ident::parse_ipv4(raw)?;
        Ok(self.ensure_ip(addr))
    }

    /// Add a typed DNS record to a domain, creating the origin and the
    /// referenced entity on first reference.
    ///
    /// Records pointing at an excluded name are dropped silently. Returns
    /// `true` when the record was appended (an identical
    /// `(kind, value, source)` triple is idempotent).
    pub fn add_dns_record(
        &mut self,
        origin: &str,
        kind: RecordKind,
        value: &str,
        source: &str,
    ) -> Result<bool> {
        let Some(name) = self.ensure_domain(origin)? else {
            return Ok(false);
        };
        let stored = match kind {
            RecordKind::Address => {
                let addr = ident::parse_ipv4(value)?;
                self.ensure_ip(addr);
                addr.to_string()
            }
            RecordKind::Alias => match self.ensure_domain(value)? {
                Some(target) => target,
                None => return Ok(false),
            },
            RecordKind::Text => value.to_string(),
            RecordKind::Pointer => {
                return Err(Error::invalid_identity(
                    "pointer records belong to addresses; use add_ptr_record",
                ));
            }
        };
        Ok(self
            .domains
            .get_mut(&name)
            .expect("domain just ensured")
            .add_record(DnsRecord::new(kind, stored, source)))
    }

    /// Add a reverse-pointer record to an address, creating the address
    /// and the referenced domain on first reference.
    pub fn add_ptr_record(&mut self, addr: Ipv4Addr, domain: &str, source: &str) -> Result<bool> {
        let Some(target) = self.ensure_domain(domain)? else {
            return Ok(false);
        };
        self.ensure_ip(addr);
        Ok(self
            .ips
            .get_mut(addr)
            .expect("address just ensured")
            .add_record(DnsRecord::new(RecordKind::Pointer, target, source)))
    }

    /// Record a NAT translation between two addresses, symmetrically.
    ///
    /// A counterpart that is already set differently is kept; the
    /// discarded value is reported as a duplicate conflict.
    pub fn translate_nat(&mut self, from: Ipv4Addr, to: Ipv4Addr, source: &str) {
        self.ensure_ip(from);
        self.ensure_ip(to);
        for (origin, destination) in [(from, to), (to, from)] {
            let current = self.ips.get(origin).and_then(|e| e.nat);
            match current {
                None => {
                    self.ips.get_mut(origin).expect("address just ensured").nat =
                        Some(destination);
                }
                Some(existing) if existing != destination => {
                    self.report.warn(
                        WarningKind::DuplicateConflict,
                        format!(
                            "NAT counterpart of {origin} is already {existing}; \
                             ignored {destination} from '{source}'"
                        ),
                    );
                }
                Some(_) => {}
            }
        }
    }

    /// Register a node, merging with any node of the same identity and
    /// consuming placeholders whose address sets overlap.
    ///
    /// Returns the canonical identity the node ended up under.
    pub fn add_node(&mut self, node: Node) -> Result<String> {
        let entering_placeholder = node.is_placeholder();
        let (identity, conflict) = self.nodes.insert(node)?;
        if let Some(detail) = conflict {
            self.report.warn(
                WarningKind::DuplicateConflict,
                format!("node '{identity}': {detail}"),
            );
        }
        if !entering_placeholder {
            // A real node consumes every placeholder it overlaps with.
            // Only directly claimed addresses count here: a proxied node
            // does not consume the placeholder standing in for its proxy.
            // Absorbed addresses can overlap further placeholders, so
            // chase to a fixpoint; each round removes at least one.
            loop {
                let claimed = self
                    .nodes
                    .get(&identity)
                    .map(|n| n.addrs.clone())
                    .unwrap_or_default();
                let overlapping: Vec<String> = self
                    .nodes
                    .iter()
                    .filter(|n| n.is_placeholder() && n.identity() != identity)
                    .filter(|n| n.addrs.iter().any(|a| claimed.contains(a)))
                    .map(|n| n.identity().to_string())
                    .collect();
                if overlapping.is_empty() {
                    break;
                }
                for old in overlapping {
                    self.supersede(&old, &identity)?;
                }
            }
        }
        Ok(identity)
    }

    /// Replace every reference to a superseded placeholder with its
    /// successor: container alias, domain and address back-references,
    /// and proxy links on other nodes.
    fn supersede(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Err(Error::resolution(format!(
                "node '{old}' cannot supersede itself"
            )));
        }
        let Some(placeholder) = self.nodes.remove(old) else {
            return Ok(());
        };
        debug!("node '{new}' supersedes placeholder '{old}'");
        self.nodes.add_alias(old, new)?;

        let successor = self
            .nodes
            .get_mut(new)
            .ok_or_else(|| Error::resolution(format!("successor '{new}' missing during supersession")))?;
        successor.merge(placeholder.rekeyed(new));

        for domain in self.domains.values_mut() {
            if domain.nodes.remove(old) {
                domain.nodes.insert(new.to_string());
            }
        }
        for ip in self.ips.values_mut() {
            if ip.nodes.remove(old) {
                ip.nodes.insert(new.to_string());
            }
        }
        for node in self.nodes.values_mut() {
            if let NodeKind::Proxied { proxy } = &mut node.kind
                && proxy.as_str() == old
            {
                *proxy = new.to_string();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Resolution

    /// Link every domain to the node(s) answering on its resolvable
    /// addresses. Runs once per refresh, after node production.
    ///
    /// Malformed record values and alias cycles are skipped or broken
    /// deterministically and recorded in the report; only a violated
    /// model invariant aborts with [`Error::Resolution`].
    pub fn resolve_nodes(&mut self) -> Result<ResolutionStats> {
        let mut stats = ResolutionStats::default();

        // Nodes claim the domains they declared directly.
        let declared: Vec<(String, Vec<String>)> = self
            .nodes
            .iter()
            .map(|n| (n.identity().to_string(), n.domains.iter().cloned().collect()))
            .collect();
        for (identity, names) in declared {
            for raw in names {
                match self.ensure_domain(&raw) {
                    Ok(Some(name)) => {
                        self.domains
                            .get_mut(&name)
                            .expect("domain just ensured")
                            .nodes
                            .insert(identity.clone());
                    }
                    Ok(None) => {}
                    Err(err) => self.report.invalid_record(&identity, &raw, err),
                }
            }
        }

        let mut claims = self.nodes.claim_index();

        for name in self.domains.names() {
            let targets = self.terminal_targets(&name);

            if targets.is_empty() {
                if self.domains.get(&name).is_some_and(|d| d.nodes.is_empty()) {
                    self.report.dangling(name.clone());
                    stats.unresolved += 1;
                } else {
                    stats.resolved += 1;
                }
                continue;
            }

            let mut claimants: BTreeSet<String> = BTreeSet::new();
            for addr in &targets {
                if let Some(ids) = claims.get(addr) {
                    claimants.extend(ids.iter().cloned());
                }
            }

            let already_claimed = self
                .domains
                .get(&name)
                .is_some_and(|d| !d.nodes.is_empty());
            if claimants.is_empty() && !already_claimed {
                let placeholder = Node::placeholder(targets.iter().copied());
                let identity = placeholder.identity().to_string();
                self.nodes.get_or_create(&identity, || placeholder)?;
                for addr in &targets {
                    claims.entry(*addr).or_default().insert(identity.clone());
                }
                claimants.insert(identity);
                stats.placeholders += 1;
                self.report.placeholders_created += 1;
            }

            for identity in &claimants {
                if let Some(node) = self.nodes.get_mut(identity) {
                    node.domains.insert(name.clone());
                }
                if let Some(domain) = self.domains.get_mut(&name) {
                    domain.nodes.insert(identity.clone());
                }
            }

            for addr in &targets {
                self.ensure_ip(*addr);
                if let Some(ids) = claims.get(addr) {
                    let ids: Vec<String> = ids.iter().cloned().collect();
                    if let Some(ip) = self.ips.get_mut(*addr) {
                        ip.nodes.extend(ids);
                    }
                }
            }

            let associated = self.domains.get(&name).map(|d| d.nodes.len()).unwrap_or(0);
            if associated > 0 {
                stats.resolved += 1;
            } else {
                stats.unresolved += 1;
            }
            if associated > 1 {
                stats.multi_homed += 1;
                self.report.multi_homed_domains.push(name.clone());
            }
        }

        Ok(stats)
    }

    /// The terminal address targets of a domain: its own address records
    /// plus those of every name reachable over its alias records.
    ///
    /// Alias cycles are broken by the visited set, first-seen wins.
    fn terminal_targets(&mut self, origin: &str) -> BTreeSet<Ipv4Addr> {
        let mut targets = BTreeSet::new();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue = VecDeque::from([origin.to_string()]);
        let mut invalid: Vec<(String, String, String)> = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(domain) = self.domains.get(&current) else {
                continue;
            };
            for record in domain.records.of_kind(RecordKind::Address) {
                match ident::parse_ipv4(&record.value) {
                    Ok(addr) => {
                        targets.insert(addr);
                    }
                    Err(err) => invalid.push((current.clone(), record.value.clone(), err.to_string())),
                }
            }
            for record in domain.records.of_kind(RecordKind::Alias) {
                match ident::normalize_domain(&record.value) {
                    Ok(next) => queue.push_back(next),
                    Err(err) => invalid.push((current.clone(), record.value.clone(), err.to_string())),
                }
            }
        }

        for (context, value, detail) in invalid {
            self.report.invalid_record(&context, &value, detail);
        }
        targets
    }

    // ------------------------------------------------------------------
    // Label attributes

    /// Organization inherited by `labels` (earliest-declared label wins).
    pub fn effective_organization(&self, labels: &BTreeSet<String>) -> Option<String> {
        self.config.organization_for(labels)
    }

    /// Role inherited by `labels` (earliest-declared label wins).
    pub fn effective_role(&self, labels: &BTreeSet<String>) -> Option<String> {
        self.config.role_for(labels)
    }

    /// Arbitrary label attribute lookup.
    pub fn label_attr(&self, labels: &BTreeSet<String>, key: &str) -> Option<&str> {
        self.config.attr_for(labels, key)
    }

    /// Fill unset organization/role attributes on every entity from its
    /// labels. Run once before the write stage; explicit assignments are
    /// never overwritten.
    pub fn apply_label_attrs(&mut self) {
        let config = self.config.clone();
        for domain in self.domains.values_mut() {
            if domain.organization.is_none() {
                domain.organization = config.organization_for(&domain.labels);
            }
            if domain.role.is_none() {
                domain.role = config.role_for(&domain.labels);
            }
        }
        for ip in self.ips.values_mut() {
            if ip.organization.is_none() {
                ip.organization = config.organization_for(&ip.labels);
            }
        }
        for node in self.nodes.values_mut() {
            if node.organization.is_none() {
                node.organization = config.organization_for(&node.labels);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries

    /// Whether `origin` resolves to `target` by following forward DNS
    /// records and NAT links. Both arguments may be a domain name or an
    /// address. Cycle-safe.
    pub fn resolves_to(&self, origin: &str, target: &str) -> bool {
        let Some(origin) = self.query_key(origin) else {
            return false;
        };
        let Some(target) = self.query_key(target) else {
            return false;
        };

        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([origin]);
        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Ok(addr) = ident::parse_ipv4(&current) {
                if let Some(ip) = self.ips.get(addr) {
                    if let Some(nat) = ip.nat {
                        queue.push_back(nat.to_string());
                    }
                    for name in ip.pointer_targets() {
                        queue.push_back(name.to_string());
                    }
                }
            } else if let Some(domain) = self.domains.get(&current) {
                for value in domain.records.iter().filter_map(|r| {
                    matches!(r.kind, RecordKind::Address | RecordKind::Alias)
                        .then_some(r.value.as_str())
                }) {
                    queue.push_back(value.to_string());
                }
            }
        }
        false
    }

    fn query_key(&self, raw: &str) -> Option<String> {
        if let Ok(addr) = ident::parse_ipv4(raw) {
            Some(addr.to_string())
        } else {
            ident::normalize_domain(raw).ok()
        }
    }

    /// Generate entities for every address of each private /24 subnet
    /// the network has at least one address in, so the handoff covers
    /// whole subnets. Returns the number of entities created.
    pub fn fill_private_subnets(&mut self) -> usize {
        let subnets: Vec<Subnet> = self.ips.private_subnets().copied().collect();
        let mut created = 0;
        for subnet in subnets {
            for addr in subnet.iter() {
                if !self.ips.contains(addr) {
                    self.ensure_ip(addr);
                    created += 1;
                }
            }
        }
        created
    }

    // ------------------------------------------------------------------
    // Read-only handoff

    /// Iterate domains in insertion order.
    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    /// Iterate addresses in insertion order.
    pub fn ips(&self) -> impl Iterator<Item = &Ipv4Address> {
        self.ips.iter()
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Shared access to one domain by normalized name.
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    /// Mutable access to one domain by normalized name.
    pub fn domain_mut(&mut self, name: &str) -> Option<&mut Domain> {
        self.domains.get_mut(name)
    }

    /// Shared access to one address entity.
    pub fn ip(&self, addr: Ipv4Addr) -> Option<&Ipv4Address> {
        self.ips.get(addr)
    }

    /// Mutable access to one address entity.
    pub fn ip_mut(&mut self, addr: Ipv4Addr) -> Option<&mut Ipv4Address> {
        self.ips.get_mut(addr)
    }

    /// Shared access to one node, following supersession aliases.
    pub fn node(&self, identity: &str) -> Option<&Node> {
        self.nodes.get(identity)
    }

    /// Mutable access to one node, following supersession aliases.
    pub fn node_mut(&mut self, identity: &str) -> Option<&mut Node> {
        self.nodes.get_mut(identity)
    }

    /// The node supersession alias map.
    pub fn node_aliases(&self) -> &HashMap<String, String> {
        self.nodes.aliases()
    }

    /// Counts of (domains, addresses, nodes).
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.domains.len(), self.ips.len(), self.nodes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network::new(NetworkConfig::default()).unwrap()
    }

    fn addr(raw: &str) -> Ipv4Addr {
        raw.parse().unwrap()
    }

    #[test]
    fn ensure_domain_is_idempotent_across_spellings() {
        let mut net = network();
        let a = net.ensure_domain("A.Example.COM.").unwrap().unwrap();
        let b = net.ensure_domain("a.example.com").unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(net.counts().0, 1);
        assert_eq!(net.domain(&a).unwrap().zone(), "example.com");
    }

    #[test]
    fn excluded_domains_are_silently_refused() {
        let config = NetworkConfig {
            exclusions: std::collections::BTreeSet::from(["internal.example.com".to_string()]),
            ..Default::default()
        };
        let mut net = Network::new(config).unwrap();
        assert_eq!(net.ensure_domain("internal.example.com").unwrap(), None);
        assert_eq!(net.counts().0, 0);

        // A record pointing at the excluded name is dropped too.
        let appended = net
            .add_dns_record("a.example.com", RecordKind::Alias, "internal.example.com", "dns-a")
            .unwrap();
        assert!(!appended);
        assert!(net.domain("a.example.com").unwrap().records.is_empty());
    }

    #[test]
    fn address_records_create_the_target_entity() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();
        let ip = net.ip(addr("10.0.0.5")).unwrap();
        assert!(ip.is_private);
    }

    #[test]
    fn placeholder_is_synthesized_for_unclaimed_addresses() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();

        let stats = net.resolve_nodes().unwrap();
        assert_eq!(stats.placeholders, 1);
        assert_eq!(net.counts().2, 1);

        let placeholder = net.nodes().next().unwrap();
        assert!(placeholder.is_placeholder());
        assert!(placeholder.domains.contains("a.example.com"));
        let domain = net.domain("a.example.com").unwrap();
        assert_eq!(domain.nodes.len(), 1);
        assert!(domain.nodes.contains(placeholder.identity()));
    }

    #[test]
    fn alias_chain_cycle_terminates() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Alias, "b.example.com", "dns-a")
            .unwrap();
        net.add_dns_record("b.example.com", RecordKind::Alias, "c.example.com", "dns-a")
            .unwrap();
        net.add_dns_record("c.example.com", RecordKind::Alias, "a.example.com", "dns-a")
            .unwrap();
        net.add_dns_record("c.example.com", RecordKind::Address, "10.0.0.9", "dns-a")
            .unwrap();

        let stats = net.resolve_nodes().unwrap();
        // All three names reach 10.0.0.9 through the chain and share one
        // placeholder.
        assert_eq!(stats.placeholders, 1);
        assert_eq!(stats.resolved, 3);
        let ids: BTreeSet<&BTreeSet<String>> =
            net.domains().map(|d| &d.nodes).collect();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn dangling_domains_are_reported_not_errors() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Text, "v=spf1 -all", "dns-a")
            .unwrap();
        let stats = net.resolve_nodes().unwrap();
        assert_eq!(stats.unresolved, 1);
        assert_eq!(net.report().dangling_domains, vec!["a.example.com".to_string()]);
    }

    #[test]
    fn malformed_record_values_are_skipped_not_fatal() {
        let mut net = network();
        net.ensure_domain("a.example.com").unwrap();
        net.domain_mut("a.example.com")
            .unwrap()
            .add_record(DnsRecord::new(RecordKind::Address, "not-an-ip", "dns-a"));

        let stats = net.resolve_nodes().unwrap();
        assert_eq!(stats.unresolved, 1);
        assert_eq!(net.report().count(WarningKind::InvalidRecord), 1);
    }

    #[test]
    fn real_node_claims_domains_through_addresses() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();
        net.add_node(
            Node::new("vm-1", "vm-1", NodeKind::Default).with_addrs([addr("10.0.0.5")]),
        )
        .unwrap();

        let stats = net.resolve_nodes().unwrap();
        assert_eq!(stats.placeholders, 0);
        assert_eq!(
            net.domain("a.example.com").unwrap().nodes,
            BTreeSet::from(["vm-1".to_string()])
        );
        assert!(net.ip(addr("10.0.0.5")).unwrap().nodes.contains("vm-1"));
    }

    #[test]
    fn overlapping_claims_associate_all_nodes() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.6", "dns-a")
            .unwrap();
        net.add_node(Node::new("vm-1", "vm-1", NodeKind::Default).with_addrs([addr("10.0.0.5")]))
            .unwrap();
        net.add_node(Node::new("vm-2", "vm-2", NodeKind::Default).with_addrs([addr("10.0.0.6")]))
            .unwrap();

        let stats = net.resolve_nodes().unwrap();
        assert_eq!(stats.multi_homed, 1);
        assert_eq!(net.domain("a.example.com").unwrap().nodes.len(), 2);
    }

    #[test]
    fn placeholder_is_superseded_by_real_node() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();
        net.resolve_nodes().unwrap();

        let placeholder_id = net.nodes().next().unwrap().identity().to_string();

        let real = net
            .add_node(Node::new("vm-1", "vm-1", NodeKind::Default).with_addrs([addr("10.0.0.5")]))
            .unwrap();

        // One live node remains, the domain points at it, the old
        // identity resolves to it as an alias.
        assert_eq!(net.counts().2, 1);
        assert_eq!(
            net.domain("a.example.com").unwrap().nodes,
            BTreeSet::from([real.clone()])
        );
        let via_alias = net.node(&placeholder_id).unwrap();
        assert_eq!(via_alias.identity(), real);
        assert!(via_alias.domains.contains("a.example.com"));
    }

    #[test]
    fn supersession_rewrites_proxy_links() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();
        net.resolve_nodes().unwrap();
        let placeholder_id = net.nodes().next().unwrap().identity().to_string();

        net.add_node(Node::new(
            "backend",
            "backend",
            NodeKind::Proxied {
                proxy: placeholder_id.clone(),
            },
        ))
        .unwrap();

        net.add_node(
            Node::new("lb", "lb", NodeKind::Proxy).with_addrs([addr("10.0.0.5")]),
        )
        .unwrap();

        match &net.node("backend").unwrap().kind {
            NodeKind::Proxied { proxy } => assert_eq!(proxy, "lb"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn nat_conflicts_keep_the_first_counterpart() {
        let mut net = network();
        net.translate_nat(addr("10.0.0.5"), addr("192.0.2.1"), "firewall");
        net.translate_nat(addr("10.0.0.5"), addr("192.0.2.9"), "firewall");

        assert_eq!(net.ip(addr("10.0.0.5")).unwrap().nat, Some(addr("192.0.2.1")));
        assert_eq!(net.report().count(WarningKind::DuplicateConflict), 1);
    }

    #[test]
    fn resolves_to_follows_records_and_nat() {
        let mut net = network();
        net.add_dns_record("a.example.com", RecordKind::Alias, "b.example.com", "dns-a")
            .unwrap();
        net.add_dns_record("b.example.com", RecordKind::Address, "10.0.0.5", "dns-a")
            .unwrap();
        net.translate_nat(addr("10.0.0.5"), addr("192.0.2.1"), "firewall");

        assert!(net.resolves_to("a.example.com", "10.0.0.5"));
        assert!(net.resolves_to("a.example.com", "192.0.2.1"));
        assert!(!net.resolves_to("b.example.com", "a.example.com"));
    }

    #[test]
    fn fill_private_subnets_completes_touched_24s() {
        let mut net = network();
        net.ensure_ip(addr("10.0.0.5"));
        net.ensure_ip(addr("8.8.8.8"));

        let created = net.fill_private_subnets();
        assert_eq!(created, 255);
        assert_eq!(net.counts().1, 257);
    }

    #[test]
    fn apply_label_attrs_fills_but_never_overwrites() {
        let config = NetworkConfig {
            labels: vec![
                crate::config::LabelConfig::new("web")
                    .with_organization("ops")
                    .with_role("webserver"),
            ],
            ..Default::default()
        };
        let mut net = Network::new(config).unwrap();
        net.ensure_domain("a.example.com").unwrap();
        net.domain_mut("a.example.com")
            .unwrap()
            .labels
            .insert("web".to_string());
        net.ensure_domain("b.example.com").unwrap();
        {
            let b = net.domain_mut("b.example.com").unwrap();
            b.labels.insert("web".to_string());
            b.organization = Some("dev".to_string());
        }

        net.apply_label_attrs();
        assert_eq!(
            net.domain("a.example.com").unwrap().organization.as_deref(),
            Some("ops")
        );
        assert_eq!(
            net.domain("a.example.com").unwrap().role.as_deref(),
            Some("webserver")
        );
        assert_eq!(
            net.domain("b.example.com").unwrap().organization.as_deref(),
            Some("dev")
        );
    }
}
