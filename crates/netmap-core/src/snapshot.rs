//! Snapshot boundary
//!
//! Converts a live [`Network`] to and from a directory tree of records:
//! one subdirectory per entity type, one JSON file per instance keyed by
//! its mangled identity, plus a manifest and the configuration the
//! network was built with. The round-trip (`write` then `read`) is the
//! recovery boundary: it reproduces an equivalent network with the same
//! objects, records and resolved associations.
//!
//! ## Layout
//!
//! ```text
//! <root>/manifest.json      version, timestamp, counts, node aliases
//! <root>/config.json        the NetworkConfig
//! <root>/domains/<key>.json one record per domain
//! <root>/ips/<key>.json     one record per address
//! <root>/nodes/<key>.json   one record per canonical node
//! ```
//!
//! Records are written to a temporary file and atomically renamed into
//! place; a record that fails to parse on load fails the whole load with
//! an error naming the file.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::ident::mangle_identity;
use crate::model::{Domain, Ipv4Address, Node};
use crate::network::Network;

/// Snapshot format version, checked on load.
pub const SNAPSHOT_VERSION: &str = "1.0";

const MANIFEST_FILE: &str = "manifest.json";
const CONFIG_FILE: &str = "config.json";
const DOMAINS_DIR: &str = "domains";
const IPS_DIR: &str = "ips";
const NODES_DIR: &str = "nodes";

/// Snapshot metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: String,
    generated_at: DateTime<Utc>,
    domains: usize,
    ips: usize,
    nodes: usize,
    #[serde(default)]
    node_aliases: HashMap<String, String>,
}

/// An entity record with its container position, so insertion order
/// survives the round-trip.
#[derive(Debug, Serialize, Deserialize)]
struct Positioned<T> {
    position: usize,
    #[serde(flatten)]
    value: T,
}

/// Write a network to a snapshot directory.
///
/// The directory is recreated from scratch; each record is written
/// atomically (temp file + rename).
pub async fn write(network: &Network, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if fs::try_exists(dir).await? {
        fs::remove_dir_all(dir).await?;
    }
    for sub in [DOMAINS_DIR, IPS_DIR, NODES_DIR] {
        fs::create_dir_all(dir.join(sub)).await?;
    }

    let (domains, ips, nodes) = network.counts();
    let manifest = Manifest {
        version: SNAPSHOT_VERSION.to_string(),
        generated_at: Utc::now(),
        domains,
        ips,
        nodes,
        node_aliases: network.node_aliases().clone(),
    };
    write_atomic(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?).await?;
    write_atomic(
        &dir.join(CONFIG_FILE),
        &serde_json::to_vec_pretty(network.config())?,
    )
    .await?;

    for (position, domain) in network.domains().enumerate() {
        let path = dir
            .join(DOMAINS_DIR)
            .join(format!("{}.json", mangle_identity(domain.name())));
        let record = Positioned {
            position,
            value: domain,
        };
        write_atomic(&path, &serde_json::to_vec_pretty(&record)?).await?;
    }

    for (position, ip) in network.ips().enumerate() {
        let path = dir
            .join(IPS_DIR)
            .join(format!("{}.json", mangle_identity(&ip.addr().to_string())));
        let record = Positioned {
            position,
            value: ip,
        };
        write_atomic(&path, &serde_json::to_vec_pretty(&record)?).await?;
    }

    for (position, node) in network.nodes().enumerate() {
        let path = dir
            .join(NODES_DIR)
            .join(format!("{}.json", mangle_identity(node.identity())));
        let record = Positioned {
            position,
            value: node,
        };
        write_atomic(&path, &serde_json::to_vec_pretty(&record)?).await?;
    }

    debug!(
        domains,
        ips,
        nodes,
        "snapshot written to {}",
        dir.display()
    );
    Ok(())
}

/// Load a network from a snapshot directory.
pub async fn read(dir: impl AsRef<Path>) -> Result<Network> {
    let dir = dir.as_ref();
    let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE)).await?;
    if manifest.version != SNAPSHOT_VERSION {
        return Err(Error::snapshot(format!(
            "unsupported snapshot version '{}' (expected '{SNAPSHOT_VERSION}')",
            manifest.version
        )));
    }
    let config: NetworkConfig = read_json(&dir.join(CONFIG_FILE)).await?;

    let domains: Vec<Domain> = read_records(&dir.join(DOMAINS_DIR)).await?;
    let ips: Vec<Ipv4Address> = read_records(&dir.join(IPS_DIR)).await?;
    let nodes: Vec<Node> = read_records(&dir.join(NODES_DIR)).await?;

    if domains.len() != manifest.domains
        || ips.len() != manifest.ips
        || nodes.len() != manifest.nodes
    {
        return Err(Error::snapshot(format!(
            "record counts do not match manifest: found {}/{}/{}, expected {}/{}/{}",
            domains.len(),
            ips.len(),
            nodes.len(),
            manifest.domains,
            manifest.ips,
            manifest.nodes
        )));
    }

    Network::from_parts(config, domains, ips, nodes, manifest.node_aliases)
}

/// Read every record in a snapshot subdirectory, restoring container
/// order from the recorded positions.
async fn read_records<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut records: Vec<Positioned<T>> = Vec::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::snapshot(format!("missing snapshot directory {}: {e}", dir.display())))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::snapshot(format!("failed reading {}: {e}", dir.display())))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = fs::read(&path).await?;
        let record: Positioned<T> = serde_json::from_slice(&raw)
            .map_err(|e| Error::snapshot(format!("corrupt record {}: {e}", path.display())))?;
        records.push(record);
    }
    records.sort_by_key(|r| r.position);
    Ok(records.into_iter().map(|r| r.value).collect())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path)
        .await
        .map_err(|e| Error::snapshot(format!("missing snapshot file {}: {e}", path.display())))?;
    serde_json::from_slice(&raw)
        .map_err(|e| Error::snapshot(format!("corrupt snapshot file {}: {e}", path.display())))
}

/// Write bytes to a file atomically: write a temporary sibling, then
/// rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }
    fs::rename(&tmp, path).await?;
    Ok(())
}
