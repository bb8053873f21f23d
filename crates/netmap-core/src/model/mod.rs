//! The network object model
//!
//! Entity types with their attributes, cross-references and merge
//! semantics. All cross-references are by key (normalized name, address,
//! node identity) rather than by pointer; the containers in
//! [`crate::container`] own the instances.

pub mod domain;
pub mod ipv4;
pub mod node;
pub mod record;

pub use domain::Domain;
pub use ipv4::Ipv4Address;
pub use node::{Node, NodeKind};
pub use record::{DnsRecord, RecordKind, RecordSet};
