//! Typed DNS records and the ordered record set

use serde::{Deserialize, Serialize};

/// The type tag of a DNS record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Address record (A-like): value is an IPv4 address.
    Address,
    /// Alias record (CNAME-like): value is another domain name.
    Alias,
    /// Text record (TXT-like): opaque value.
    Text,
    /// Reverse-pointer record (PTR-like): value is a domain name.
    /// Carried by address entities.
    Pointer,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordKind::Address => "address",
            RecordKind::Alias => "alias",
            RecordKind::Text => "text",
            RecordKind::Pointer => "pointer",
        };
        f.write_str(s)
    }
}

/// A single typed DNS record.
///
/// Two records are considered the same when their `(kind, value, source)`
/// triples match; the optional `id` distinguishes multiple records of the
/// same type without participating in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record type tag.
    pub kind: RecordKind,
    /// Record value: an address, a domain name, or free text per `kind`.
    pub value: String,
    /// Name of the plugin that contributed the record.
    pub source: String,
    /// Optional per-record identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DnsRecord {
    /// Create a record without a per-record identity.
    pub fn new(kind: RecordKind, value: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            source: source.into(),
            id: None,
        }
    }

    /// Attach a per-record identity.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn triple(&self) -> (RecordKind, &str, &str) {
        (self.kind, self.value.as_str(), self.source.as_str())
    }
}

/// An ordered-by-discovery set of DNS records.
///
/// Re-adding an identical `(kind, value, source)` triple is idempotent; a
/// differing triple always appends. Records are never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<DnsRecord>,
}

impl RecordSet {
    /// Create an empty record set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record unless an identical triple already exists.
    ///
    /// Returns `true` when the record was appended.
    pub fn add(&mut self, record: DnsRecord) -> bool {
        if self.records.iter().any(|r| r.triple() == record.triple()) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Union with another set, preserving this set's discovery order and
    /// appending the other's novel records in their order.
    pub fn merge(&mut self, other: RecordSet) {
        for record in other.records {
            self.add(record);
        }
    }

    /// Iterate all records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &DnsRecord> {
        self.records.iter()
    }

    /// Iterate records of one kind, in discovery order.
    pub fn of_kind(&self, kind: RecordKind) -> impl Iterator<Item = &DnsRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Values of records of one kind, in discovery order.
    pub fn values_of(&self, kind: RecordKind) -> impl Iterator<Item = &str> {
        self.of_kind(kind).map(|r| r.value.as_str())
    }

    /// Whether the set holds a record matching the triple.
    pub fn contains(&self, kind: RecordKind, value: &str, source: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.triple() == (kind, value, source))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a DnsRecord;
    type IntoIter = std::slice::Iter<'a, DnsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_triple_is_idempotent() {
        let mut set = RecordSet::new();
        assert!(set.add(DnsRecord::new(RecordKind::Address, "10.0.0.5", "dns-a")));
        assert!(!set.add(DnsRecord::new(RecordKind::Address, "10.0.0.5", "dns-a")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn differing_triple_appends() {
        let mut set = RecordSet::new();
        set.add(DnsRecord::new(RecordKind::Address, "10.0.0.5", "dns-a"));
        set.add(DnsRecord::new(RecordKind::Address, "10.0.0.5", "dns-b"));
        set.add(DnsRecord::new(RecordKind::Address, "10.0.0.6", "dns-a"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn per_record_identity_does_not_affect_identity() {
        let mut set = RecordSet::new();
        set.add(DnsRecord::new(RecordKind::Text, "v=spf1", "dns-a").with_id("0"));
        assert!(!set.add(DnsRecord::new(RecordKind::Text, "v=spf1", "dns-a").with_id("1")));
    }

    #[test]
    fn merge_is_a_union_in_either_order() {
        let mut a = RecordSet::new();
        a.add(DnsRecord::new(RecordKind::Address, "10.0.0.5", "dns-a"));
        a.add(DnsRecord::new(RecordKind::Alias, "web.example.com", "dns-a"));

        let mut b = RecordSet::new();
        b.add(DnsRecord::new(RecordKind::Address, "10.0.0.5", "dns-a"));
        b.add(DnsRecord::new(RecordKind::Address, "10.0.0.9", "dns-b"));

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        assert_eq!(ab.len(), 3);
        assert_eq!(ba.len(), 3);
        let lhs: std::collections::BTreeSet<_> =
            ab.iter().map(|r| (r.kind, r.value.clone(), r.source.clone())).collect();
        let rhs: std::collections::BTreeSet<_> =
            ba.iter().map(|r| (r.kind, r.value.clone(), r.source.clone())).collect();
        assert_eq!(lhs, rhs);
    }
}
