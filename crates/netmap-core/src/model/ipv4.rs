//! The IPv4Address entity

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::record::{DnsRecord, RecordKind, RecordSet};

/// A single IPv4 address found in the network.
///
/// Exactly one instance exists per address. Classification and location
/// are derived from configuration at creation time by the Network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Address {
    addr: Ipv4Addr,

    /// Whether the address falls in private space.
    pub is_private: bool,

    /// Location name of the smallest configured subnet containing the
    /// address, if any.
    pub location: Option<String>,

    /// NAT counterpart address, if discovered.
    pub nat: Option<Ipv4Addr>,

    /// Reverse-pointer records originating at this address.
    pub records: RecordSet,

    /// Tags contributed by configuration or plugins.
    pub labels: BTreeSet<String>,

    /// Explicit organization association, if any.
    pub organization: Option<String>,

    /// Free-text notes fragment.
    pub notes: String,

    /// Identities of the nodes claiming this address. Populated by the
    /// resolution pass.
    pub nodes: BTreeSet<String>,
}

impl Ipv4Address {
    /// Create an address entity with its derived classification.
    pub(crate) fn new(addr: Ipv4Addr, is_private: bool, location: Option<String>) -> Self {
        Self {
            addr,
            is_private,
            location,
            nat: None,
            records: RecordSet::new(),
            labels: BTreeSet::new(),
            organization: None,
            notes: String::new(),
            nodes: BTreeSet::new(),
        }
    }

    /// The address value.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// The address as a comparable integer for ordering and range tests.
    pub fn bits(&self) -> u32 {
        u32::from(self.addr)
    }

    /// The `in-addr.arpa` zone of this address.
    pub fn reverse_zone(&self) -> String {
        crate::ident::reverse_zone(self.addr)
    }

    /// Append a record unless an identical triple already exists.
    pub fn add_record(&mut self, record: DnsRecord) -> bool {
        self.records.add(record)
    }

    /// Values of this address's reverse-pointer records.
    pub fn pointer_targets(&self) -> impl Iterator<Item = &str> {
        self.records.values_of(RecordKind::Pointer)
    }

    /// True when no record references this address and it resolves to no
    /// node.
    pub fn unused(&self) -> bool {
        self.records.is_empty() && self.nodes.is_empty() && self.nat.is_none()
    }

    /// Merge another instance of the same address into this one.
    ///
    /// Returns the NAT counterpart that was discarded when both sides
    /// already carried different counterparts (first-writer-wins).
    pub fn merge(&mut self, other: Ipv4Address) -> Option<Ipv4Addr> {
        debug_assert_eq!(self.addr, other.addr, "merging different addresses");
        self.records.merge(other.records);
        self.labels.extend(other.labels);
        self.nodes.extend(other.nodes);
        if self.organization.is_none() {
            self.organization = other.organization;
        }
        if self.location.is_none() {
            self.location = other.location;
        }
        if self.notes.is_empty() {
            self.notes = other.notes;
        }
        match (self.nat, other.nat) {
            (None, Some(nat)) => {
                self.nat = Some(nat);
                None
            }
            (Some(kept), Some(dropped)) if kept != dropped => Some(dropped),
            _ => None,
        }
    }
}
