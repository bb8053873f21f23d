// # netmap-core
//
// Core library for the netmap network-documentation system.
//
// netmap aggregates network topology facts (DNS records, IPv4 addresses,
// physical and virtual endpoints) from many plugin-supplied sources into
// a single consistent in-memory model, resolves which endpoints the DNS
// names actually point at, and hands the model to a snapshot/rendering
// boundary.
//
// ## Architecture Overview
//
// - **ident**: canonicalizes external identifiers into validated keys
// - **model**: the entity types (Domain, Ipv4Address, Node) and their
//   merge semantics
// - **container**: per-type registries enforcing one instance per
//   identity, merge-on-insert
// - **network**: the root aggregate and the node-resolution algorithm
// - **plugin** / **scheduler**: the extension contract and the lifecycle
//   state machine driving population of the model
// - **snapshot**: the directory-tree recovery/handoff format
//
// ## Design Principles
//
// 1. **Single creation path**: entities only come into existence through
//    the Network's ensure/add operations, which guarantees the
//    one-instance-per-identity invariant
// 2. **First-writer-wins merging**: facts from different sources combine
//    deterministically regardless of plugin order within a stage
// 3. **Partial-failure isolation**: a broken plugin or record never takes
//    the refresh down; only a violated core invariant does
// 4. **Explicit registration**: plugins are compiled in and registered at
//    startup, there is no runtime discovery

pub mod config;
pub mod container;
pub mod error;
pub mod ident;
pub mod model;
pub mod network;
pub mod plugin;
pub mod report;
pub mod scheduler;
pub mod snapshot;

// Re-export core types for convenience
pub use config::{LabelConfig, NetworkConfig, OrganizationConfig, SchedulerConfig, SubnetConfig};
pub use error::{Error, Result};
pub use ident::Subnet;
pub use model::{DnsRecord, Domain, Ipv4Address, Node, NodeKind, RecordKind};
pub use network::{Network, ResolutionStats};
pub use plugin::{LifecycleStage, Plugin, PluginRegistry, PluginWhitelist};
pub use report::{Report, Warning, WarningKind};
pub use scheduler::{PluginOutcome, PluginState, RefreshEvent, RefreshSummary, Scheduler};
