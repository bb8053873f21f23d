//! Identity and naming helpers
//!
//! Canonicalizes external identifiers (domain names, IPv4 addresses) into
//! validated, comparable keys, classifies addresses as public/private and
//! computes containing subnets. All keys that enter the object containers
//! pass through this module first.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SubnetConfig;
use crate::error::{Error, Result};

/// RFC1918 private address space.
const RFC1918: [Subnet; 3] = [
    Subnet::from_parts(Ipv4Addr::new(10, 0, 0, 0), 8),
    Subnet::from_parts(Ipv4Addr::new(172, 16, 0, 0), 12),
    Subnet::from_parts(Ipv4Addr::new(192, 168, 0, 0), 16),
];

/// Normalize a raw domain name into the canonical key form.
///
/// Lower-cases, trims surrounding whitespace and one trailing root dot.
/// Rejects empty names, empty labels, over-long labels, and characters
/// outside `[a-z0-9-_]`.
pub fn normalize_domain(raw: &str) -> Result<String> {
    let name = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() {
        return Err(Error::invalid_identity(format!(
            "empty domain name: {raw:?}"
        )));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_identity(format!(
                "domain {raw:?} contains an empty label"
            )));
        }
        if label.len() > 63 {
            return Err(Error::invalid_identity(format!(
                "domain {raw:?} contains a label longer than 63 octets"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_identity(format!(
                "domain {raw:?} contains a label with a leading or trailing hyphen"
            )));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
        {
            return Err(Error::invalid_identity(format!(
                "domain {raw:?} contains invalid characters"
            )));
        }
    }
    Ok(name)
}

/// Returns the registrable zone a normalized name belongs to: the final
/// two labels, or the name itself when it has only one label.
pub fn root_zone(name: &str) -> String {
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        name.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

/// Parse a dotted-quad IPv4 address.
pub fn parse_ipv4(raw: &str) -> Result<Ipv4Addr> {
    raw.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| Error::invalid_identity(format!("invalid IPv4 address: {raw:?}")))
}

/// Returns the `in-addr.arpa` zone for an address.
pub fn reverse_zone(addr: Ipv4Addr) -> String {
    let o = addr.octets();
    format!("{}.{}.{}.in-addr.arpa", o[2], o[1], o[0])
}

/// Tests whether an address falls in RFC1918 space or one of the
/// additionally configured private ranges.
pub fn is_private(addr: Ipv4Addr, extra: &[Subnet]) -> bool {
    RFC1918.iter().chain(extra).any(|s| s.contains(addr))
}

/// Among the configured subnets, return the one with the longest prefix
/// that contains `addr`. On equal prefix length the first-declared subnet
/// wins.
pub fn smallest_containing(addr: Ipv4Addr, subnets: &[SubnetConfig]) -> Option<&SubnetConfig> {
    let mut best: Option<&SubnetConfig> = None;
    for candidate in subnets {
        if !candidate.cidr.contains(addr) {
            continue;
        }
        match best {
            Some(current) if candidate.cidr.prefix() <= current.cidr.prefix() => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Mangle an identity into a filesystem-safe record file stem.
pub fn mangle_identity(identity: &str) -> String {
    identity
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// An IPv4 CIDR subnet.
///
/// Stored as the floored network address plus prefix length; all range
/// tests happen on the `u32` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    network: u32,
    prefix: u8,
}

impl Subnet {
    /// Construct from an address and prefix length, flooring the address
    /// to the prefix boundary. Prefix must already be <= 32.
    pub const fn from_parts(addr: Ipv4Addr, prefix: u8) -> Self {
        let bits = u32::from_be_bytes(addr.octets());
        let network = if prefix == 0 { 0 } else { bits & (u32::MAX << (32 - prefix)) };
        Self { network, prefix }
    }

    /// The /24 subnet containing an address.
    pub fn enclosing_24(addr: Ipv4Addr) -> Self {
        Self::from_parts(addr, 24)
    }

    /// The floored network address.
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    /// Prefix length in bits.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Lowest address in the subnet, as an integer.
    fn lower(&self) -> u32 {
        self.network
    }

    /// Highest address in the subnet, as an integer.
    fn upper(&self) -> u32 {
        if self.prefix == 0 {
            u32::MAX
        } else {
            self.network | (u32::MAX >> self.prefix)
        }
    }

    /// Tests whether the subnet contains an address.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let bits = u32::from(addr);
        bits >= self.lower() && bits <= self.upper()
    }

    /// Iterate every address in the subnet, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (self.lower()..=self.upper()).map(Ipv4Addr::from)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

impl FromStr for Subnet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::invalid_identity(format!("invalid subnet: {s:?}")))?;
        let addr = parse_ipv4(addr)?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| Error::invalid_identity(format!("invalid subnet prefix: {s:?}")))?;
        if prefix > 32 {
            return Err(Error::invalid_identity(format!(
                "subnet prefix out of range: {s:?}"
            )));
        }
        Ok(Self::from_parts(addr, prefix))
    }
}

impl TryFrom<String> for Subnet {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(value: Subnet) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_case_and_root_insensitive() {
        for raw in ["WWW.Example.COM", "www.example.com.", " www.example.com "] {
            assert_eq!(normalize_domain(raw).unwrap(), "www.example.com");
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for raw in ["", ".", "a..b", ".example.com", "bad!.example.com", "-x.example.com"] {
            assert!(normalize_domain(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn root_zone_is_last_two_labels() {
        assert_eq!(root_zone("a.b.example.com"), "example.com");
        assert_eq!(root_zone("localhost"), "localhost");
    }

    #[test]
    fn rfc1918_ranges_are_private() {
        for raw in ["10.0.0.1", "172.16.0.1", "172.31.255.255", "192.168.1.1"] {
            assert!(is_private(parse_ipv4(raw).unwrap(), &[]), "{raw} not private");
        }
        assert!(!is_private(parse_ipv4("8.8.8.8").unwrap(), &[]));
        assert!(!is_private(parse_ipv4("172.32.0.1").unwrap(), &[]));
    }

    #[test]
    fn extra_ranges_extend_private_space() {
        let extra = vec!["100.64.0.0/10".parse::<Subnet>().unwrap()];
        assert!(is_private(parse_ipv4("100.64.0.1").unwrap(), &extra));
    }

    #[test]
    fn subnet_contains_floors_the_network() {
        let subnet: Subnet = "10.0.0.77/24".parse().unwrap();
        assert_eq!(subnet.to_string(), "10.0.0.0/24");
        assert!(subnet.contains(parse_ipv4("10.0.0.255").unwrap()));
        assert!(!subnet.contains(parse_ipv4("10.0.1.0").unwrap()));
    }

    #[test]
    fn longest_prefix_wins() {
        let subnets = vec![
            SubnetConfig::new("10.0.0.0/8".parse().unwrap(), "dc-wide"),
            SubnetConfig::new("10.1.0.0/16".parse().unwrap(), "rack-1"),
        ];
        let hit = smallest_containing(parse_ipv4("10.1.2.3").unwrap(), &subnets).unwrap();
        assert_eq!(hit.location, "rack-1");
        let miss = smallest_containing(parse_ipv4("192.0.2.1").unwrap(), &subnets);
        assert!(miss.is_none());
    }

    #[test]
    fn equal_prefix_first_declared_wins() {
        let subnets = vec![
            SubnetConfig::new("10.1.0.0/16".parse().unwrap(), "first"),
            SubnetConfig::new("10.1.0.0/16".parse().unwrap(), "second"),
        ];
        let hit = smallest_containing(parse_ipv4("10.1.2.3").unwrap(), &subnets).unwrap();
        assert_eq!(hit.location, "first");
    }

    #[test]
    fn reverse_zone_uses_first_three_octets() {
        assert_eq!(reverse_zone(parse_ipv4("10.1.2.3").unwrap()), "2.1.10.in-addr.arpa");
    }
}
