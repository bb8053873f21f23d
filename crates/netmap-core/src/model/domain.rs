//! The Domain entity

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::record::{DnsRecord, RecordKind, RecordSet};

/// A unique DNS name in the network.
///
/// Exactly one instance exists per normalized name within a Network; the
/// container enforces this by merging on insert. Names are created
/// normalized (see [`crate::ident::normalize_domain`]) before they reach
/// this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    name: String,
    zone: String,

    /// Records originating at this name, ordered by discovery.
    pub records: RecordSet,

    /// Tags contributed by configuration or plugins.
    pub labels: BTreeSet<String>,

    /// Explicit organization association, if any.
    pub organization: Option<String>,

    /// Assigned role/category, if any.
    pub role: Option<String>,

    /// Free-text notes fragment.
    pub notes: String,

    /// Identities of the nodes this name resolves to. Populated by the
    /// resolution pass; a name may legitimately resolve to several nodes.
    pub nodes: BTreeSet<String>,
}

impl Domain {
    /// Create a domain from an already-normalized name and its zone.
    pub(crate) fn new(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone: zone.into(),
            records: RecordSet::new(),
            labels: BTreeSet::new(),
            organization: None,
            role: None,
            notes: String::new(),
            nodes: BTreeSet::new(),
        }
    }

    /// The normalized name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The zone this name belongs to.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Append a record unless an identical `(kind, value, source)` triple
    /// already exists. Returns `true` when appended.
    pub fn add_record(&mut self, record: DnsRecord) -> bool {
        self.records.add(record)
    }

    /// Values of this domain's alias records.
    pub fn alias_targets(&self) -> impl Iterator<Item = &str> {
        self.records.values_of(RecordKind::Alias)
    }

    /// Values of this domain's address records.
    pub fn address_targets(&self) -> impl Iterator<Item = &str> {
        self.records.values_of(RecordKind::Address)
    }

    /// Merge another instance of the same name into this one.
    ///
    /// Record and label sets are unioned; single-value attributes are
    /// filled only if currently unset, never overwritten, so the outcome
    /// is deterministic regardless of which plugin reported first within
    /// a stage.
    pub fn merge(&mut self, other: Domain) {
        debug_assert_eq!(self.name, other.name, "merging domains with different names");
        self.records.merge(other.records);
        self.labels.extend(other.labels);
        self.nodes.extend(other.nodes);
        if self.organization.is_none() {
            self.organization = other.organization;
        }
        if self.role.is_none() {
            self.role = other.role;
        }
        if self.notes.is_empty() {
            self.notes = other.notes;
        }
    }
}
